//! Groth16 over BN254 with snarkjs-format proofs and verification keys.
//!
//! Points are JSON arrays of decimal strings in projective form:
//! G1 `[x, y, "1"]`, G2 `[[x.c0, x.c1], [y.c0, y.c1], ["1", "0"]]`.

use std::str::FromStr;

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_groth16::{prepare_verifying_key, Groth16, Proof, VerifyingKey};
use serde::Deserialize;

use crate::field::parse_field_element;
use crate::{ProofError, ProofVerifier, VerificationKey};

#[derive(Deserialize)]
struct SnarkjsProof {
    pi_a: Vec<String>,
    pi_b: Vec<Vec<String>>,
    pi_c: Vec<String>,
}

#[derive(Deserialize)]
struct SnarkjsVerifyingKey {
    #[serde(default, rename = "nPublic")]
    n_public: Option<usize>,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

fn fq(s: &str) -> Result<Fq, String> {
    Fq::from_str(s.trim()).map_err(|_| format!("'{s}' is not a base field element"))
}

fn g1(coords: &[String]) -> Result<G1Affine, String> {
    let [x, y, z] = coords else {
        return Err(format!("G1 point needs 3 coordinates, got {}", coords.len()));
    };
    if z.trim() != "1" {
        return Err("G1 point must be affine (z = 1)".into());
    }
    let point = G1Affine::new_unchecked(fq(x)?, fq(y)?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G1 point is not on the curve".into());
    }
    Ok(point)
}

fn g2(coords: &[Vec<String>]) -> Result<G2Affine, String> {
    let [x, y, z] = coords else {
        return Err(format!("G2 point needs 3 coordinates, got {}", coords.len()));
    };
    let fq2 = |c: &Vec<String>| -> Result<Fq2, String> {
        match c.as_slice() {
            [c0, c1] => Ok(Fq2::new(fq(c0)?, fq(c1)?)),
            _ => Err(format!("Fq2 element needs 2 limbs, got {}", c.len())),
        }
    };
    if fq2(z)? != Fq2::new(Fq::from(1u64), Fq::from(0u64)) {
        return Err("G2 point must be affine (z = 1)".into());
    }
    let point = G2Affine::new_unchecked(fq2(x)?, fq2(y)?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G2 point is not on the curve".into());
    }
    Ok(point)
}

fn parse_key(key: &VerificationKey) -> Result<VerifyingKey<Bn254>, ProofError> {
    let raw: SnarkjsVerifyingKey =
        serde_json::from_slice(&key.bytes).map_err(|e| ProofError::BadKey(e.to_string()))?;
    let gamma_abc_g1 = raw
        .ic
        .iter()
        .map(|p| g1(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ProofError::BadKey)?;
    if let Some(n) = raw.n_public {
        if gamma_abc_g1.len() != n + 1 {
            return Err(ProofError::BadKey(format!(
                "nPublic is {n} but IC has {} points",
                gamma_abc_g1.len()
            )));
        }
    }
    Ok(VerifyingKey {
        alpha_g1: g1(&raw.vk_alpha_1).map_err(ProofError::BadKey)?,
        beta_g2: g2(&raw.vk_beta_2).map_err(ProofError::BadKey)?,
        gamma_g2: g2(&raw.vk_gamma_2).map_err(ProofError::BadKey)?,
        delta_g2: g2(&raw.vk_delta_2).map_err(ProofError::BadKey)?,
        gamma_abc_g1,
    })
}

fn parse_proof(proof: &serde_json::Value) -> Result<Proof<Bn254>, ProofError> {
    let raw = SnarkjsProof::deserialize(proof).map_err(|e| ProofError::Malformed(e.to_string()))?;
    Ok(Proof {
        a: g1(&raw.pi_a).map_err(ProofError::Malformed)?,
        b: g2(&raw.pi_b).map_err(ProofError::Malformed)?,
        c: g1(&raw.pi_c).map_err(ProofError::Malformed)?,
    })
}

fn parse_inputs(inputs: &[String]) -> Result<Vec<Fr>, ProofError> {
    inputs
        .iter()
        .map(|s| {
            parse_field_element(s)
                .ok_or_else(|| ProofError::Malformed(format!("public input '{s}' is not a field element")))
        })
        .collect()
}

/// [`ProofVerifier`] for snarkjs Groth16 proofs on BN254.
#[derive(Clone, Copy, Debug, Default)]
pub struct Groth16Verifier;

impl ProofVerifier for Groth16Verifier {
    fn verify(
        &self,
        proof: &serde_json::Value,
        public_inputs: &[String],
        key: &VerificationKey,
    ) -> Result<(), ProofError> {
        let vk = parse_key(key)?;
        let proof = parse_proof(proof)?;
        let inputs = parse_inputs(public_inputs)?;
        if inputs.len() + 1 != vk.gamma_abc_g1.len() {
            return Err(ProofError::Malformed(format!(
                "key expects {} public inputs, got {}",
                vk.gamma_abc_g1.len().saturating_sub(1),
                inputs.len()
            )));
        }
        let pvk = prepare_verifying_key(&vk);
        match Groth16::<Bn254>::verify_proof(&pvk, &proof, &inputs) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProofError::Invalid),
            Err(e) => Err(ProofError::Malformed(e.to_string())),
        }
    }

    fn check_key(&self, key: &VerificationKey) -> Result<(), ProofError> {
        parse_key(key).map(|_| ())
    }
}
