//! Test credentials generated on the fly.
//!
//! Compiled for this crate's own tests and, with the `test-support`
//! feature, for dependents' tests.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const PASSPHRASE: &str = "correct horse battery staple";
pub const TEAM_ID: &str = "ABCDE12345";
pub const PASS_TYPE: &str = "pass.com.example.card";

/// Helper to generate a test EC key pair
pub fn generate_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    PKey::from_ec_key(ec_key).unwrap()
}

/// Helper to build a certificate for `key`, self-signed unless an issuer is given
pub fn build_cert(
    common_name: &str,
    org_unit: Option<&str>,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    valid_days: (u32, u32),
) -> X509 {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("CN", common_name).unwrap();
    if let Some(ou) = org_unit {
        name_builder.append_entry_by_text("OU", ou).unwrap();
    }
    let name = name_builder.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(rand_serial()).unwrap();
    builder.set_serial_number(&serial.to_asn1_integer().unwrap()).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(valid_days.0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(valid_days.1).unwrap())
        .unwrap();

    match issuer {
        Some((issuer_cert, issuer_key)) => {
            builder.set_issuer_name(issuer_cert.subject_name()).unwrap();
            builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
        }
        None => {
            builder.set_issuer_name(&name).unwrap();
            builder.sign(key, MessageDigest::sha256()).unwrap();
        }
    }
    builder.build()
}

fn rand_serial() -> u32 {
    let mut buf = [0u8; 4];
    openssl::rand::rand_bytes(&mut buf).unwrap();
    u32::from_be_bytes(buf) >> 1
}

/// A PKCS#12 store plus a WWDR-style intermediate on disk.
pub struct Credentials {
    pub dir: TempDir,
    pub p12_path: PathBuf,
    pub wwdr_path: PathBuf,
    pub signer_cert: X509,
    pub signer_key: PKey<Private>,
    pub wwdr_cert: X509,
}

pub fn credentials() -> Credentials {
    let wwdr_key = generate_key();
    let wwdr_cert = build_cert("Test WWDR Intermediate", Some("G4"), &wwdr_key, None, (0, 365));

    let signer_key = generate_key();
    let signer_cert = build_cert(
        &format!("Pass Type ID: {PASS_TYPE}"),
        Some(TEAM_ID),
        &signer_key,
        Some((&wwdr_cert, &wwdr_key)),
        (0, 365),
    );

    let pkcs12 = Pkcs12::builder()
        .name(PASS_TYPE)
        .pkey(&signer_key)
        .cert(&signer_cert)
        .build2(PASSPHRASE)
        .unwrap();

    let dir = TempDir::new().unwrap();
    let p12_path = dir.path().join("pass.p12");
    fs::write(&p12_path, pkcs12.to_der().unwrap()).unwrap();
    let wwdr_path = dir.path().join("wwdr.pem");
    fs::write(&wwdr_path, wwdr_cert.to_pem().unwrap()).unwrap();

    Credentials {
        dir,
        p12_path,
        wwdr_path,
        signer_cert,
        signer_key,
        wwdr_cert,
    }
}
