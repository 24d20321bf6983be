mod common;

use std::sync::Arc;

use airdrop_verification::field::parse_field_element;
use airdrop_verification::{
    AddressBindingMode, ClaimRequest, Groth16Verifier, IdentityVerifier, Rejection,
    VerificationError, VerificationKeys, ZkProof,
};
use ark_bn254::{Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, PrimeField};
use common::*;
use serde_json::{json, Value};

fn coord<F: PrimeField>(f: F) -> String {
    f.into_bigint().to_string()
}

fn g1_json(p: G1Affine) -> Value {
    json!([coord(p.x), coord(p.y), "1"])
}

fn g2_json(p: G2Affine) -> Value {
    json!([
        [coord(p.x.c0), coord(p.x.c1)],
        [coord(p.y.c0), coord(p.y.c1)],
        ["1", "0"]
    ])
}

/// A verification key built from known scalars, so a valid proof can be
/// written down for any public inputs: A = alpha, B = beta, C = -IC(x),
/// with gamma = delta = the G2 generator.
struct KnownTrapdoor {
    alpha: G1Affine,
    beta: G2Affine,
    ic: Vec<G1Affine>,
}

impl KnownTrapdoor {
    fn new(n_public: usize) -> Self {
        let g1 = G1Affine::generator();
        Self {
            alpha: (g1 * Fr::from(5u64)).into_affine(),
            beta: (G2Affine::generator() * Fr::from(7u64)).into_affine(),
            ic: (0..=n_public)
                .map(|i| (g1 * Fr::from(i as u64 + 11)).into_affine())
                .collect(),
        }
    }

    fn key(&self) -> Vec<u8> {
        let g2 = G2Affine::generator();
        let vk = json!({
            "protocol": "groth16",
            "curve": "bn128",
            "nPublic": self.ic.len() - 1,
            "vk_alpha_1": g1_json(self.alpha),
            "vk_beta_2": g2_json(self.beta),
            "vk_gamma_2": g2_json(g2),
            "vk_delta_2": g2_json(g2),
            "IC": self.ic.iter().map(|p| g1_json(*p)).collect::<Vec<_>>(),
        });
        serde_json::to_vec(&vk).unwrap()
    }

    fn prove(&self, signals: &[String]) -> Value {
        let mut acc: G1Projective = self.ic[0].into_group();
        for (signal, point) in signals.iter().zip(&self.ic[1..]) {
            acc += *point * parse_field_element(signal).unwrap();
        }
        json!({
            "pi_a": g1_json(self.alpha),
            "pi_b": g2_json(self.beta),
            "pi_c": g1_json((-acc).into_affine()),
        })
    }
}

/// Every input in the decimal form snarkjs emits.
fn decimal_signals(nullifier: &str, addr: &str) -> Vec<String> {
    let mut s = vec!["0".to_string(); 14];
    s[0] = nullifier.into();
    s[1] = "990101".into();
    s[2] = "240501".into();
    s[6] = "4608577".into(); // "FRA"
    s[7] = EXPIRES.into();
    s[9] = EVENT_ID.into();
    s[10] = AddressBindingMode::Blake2b.expected(&codec(), addr).unwrap();
    s[12] = SELECTOR.into();
    s
}

fn groth16_verifier(trapdoor: &KnownTrapdoor) -> IdentityVerifier {
    let mut keys = VerificationKeys::new();
    keys.insert("sha256", trapdoor.key());
    IdentityVerifier::new(policy(), keys, Arc::new(Groth16Verifier), codec()).unwrap()
}

fn claim(address: String, proof: Value, pub_signals: Vec<String>) -> ClaimRequest {
    ClaimRequest {
        address,
        algorithm: "sha256".into(),
        zk_proof: ZkProof { proof, pub_signals },
    }
}

fn other_address() -> String {
    codec()
        .encode(&airdrop_crypto::keypair_from_seed(&[99u8; 32]).public)
        .as_str()
        .to_string()
}

#[test]
fn valid_proof_passes_every_check() {
    let trapdoor = KnownTrapdoor::new(14);
    let s = decimal_signals("771", &address());
    let req = claim(address(), trapdoor.prove(&s), s);

    let verified = groth16_verifier(&trapdoor)
        .verify(&req, &MemStore::default(), now())
        .unwrap();
    assert_eq!(verified.nullifier, "771");
    assert_eq!(verified.citizenship, "FRA");
}

#[test]
fn hex_binding_is_the_same_field_element() {
    let trapdoor = KnownTrapdoor::new(14);
    let mut s = decimal_signals("772", &address());
    let proof = trapdoor.prove(&s);
    let binding = parse_field_element(&s[10]).unwrap();
    s[10] = format!("0x{}", hex::encode(binding.into_bigint().to_bytes_be()));

    let req = claim(address(), proof, s);
    assert!(groth16_verifier(&trapdoor)
        .verify(&req, &MemStore::default(), now())
        .is_ok());
}

#[test]
fn valid_proof_for_another_address_rejected() {
    let trapdoor = KnownTrapdoor::new(14);
    let s = decimal_signals("773", &address());
    let req = claim(other_address(), trapdoor.prove(&s), s);

    match groth16_verifier(&trapdoor).verify(&req, &MemStore::default(), now()) {
        Err(VerificationError::Rejected(Rejection::AddressMismatch(addr))) => {
            assert_eq!(addr, other_address())
        }
        other => panic!("expected an address mismatch, got {other:?}"),
    }
}

#[test]
fn altered_input_breaks_proof() {
    let trapdoor = KnownTrapdoor::new(14);
    let mut s = decimal_signals("774", &address());
    let proof = trapdoor.prove(&s);
    s[0] = "775".into();

    let req = claim(address(), proof, s);
    assert!(matches!(
        groth16_verifier(&trapdoor).verify(&req, &MemStore::default(), now()),
        Err(VerificationError::Rejected(Rejection::InvalidProof))
    ));
}
