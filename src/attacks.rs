//! Analytical models for Grover's and Shor's algorithm impacts
//!
//! No quantum circuits are simulated; these are complexity-based estimators
//! for the effective strength of symmetric keys under Grover and the
//! feasibility of breaking RSA-class moduli under Shor. The Shor estimator
//! uses extremely rough scaling relationships and is for illustration only.

/// Approximate security bits of a symmetric key under Grover.
///
/// Grover yields a quadratic speedup, effectively halving the exponent of a
/// brute-force search, so a k-bit key offers roughly k/2 bits.
pub fn effective_symmetric_security_bits(classical_bits: u32) -> u32 {
    classical_bits / 2
}

/// Symmetric key size whose Grover-reduced strength still meets the target
pub fn required_classical_bits_for_post_quantum(target_security_bits: u32) -> u32 {
    2 * target_security_bits
}

/// Approximate classical security of an RSA modulus in bits.
///
/// Uses the common Lenstra-Verheul mapping for the standard sizes and a
/// sub-exponential scaling estimate elsewhere.
pub fn rsa_classical_security_bits(modulus_bits: u32) -> u32 {
    match modulus_bits {
        1024 => 80,
        2048 => 112,
        3072 => 128,
        4096 => 152,
        _ => {
            let n = modulus_bits as f64;
            (0.3 * n.powf(1.0 / 3.0) * n.ln().powf(2.0 / 3.0)) as u32
        }
    }
}

/// Toy estimate of years needed to break an RSA modulus with a
/// fault-tolerant quantum computer.
///
/// Scales cubically with the modulus size and inversely with the logical
/// qubit budget; intended only to illustrate why large error-corrected
/// machines are required for RSA-2048.
pub fn shor_break_feasibility_years(
    rsa_bits: u32,
    logical_qubits: u64,
    surface_code_cycle_ns: f64,
) -> f64 {
    if logical_qubits == 0 {
        return f64::INFINITY;
    }
    let n = rsa_bits as f64;
    // Gate count for Shor scales roughly with n^3
    let total_operations = n.powi(3);
    // Qubits beyond the ~2n working set parallelize the modular arithmetic
    let required_qubits = 2.0 * n;
    let parallelism = (logical_qubits as f64 / required_qubits).max(1e-6);
    let seconds = total_operations * surface_code_cycle_ns * 1e-9 / parallelism;
    seconds / (365.25 * 24.0 * 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grover_halves_security() {
        assert_eq!(effective_symmetric_security_bits(128), 64);
        assert_eq!(effective_symmetric_security_bits(256), 128);
    }

    #[test]
    fn test_post_quantum_key_size_doubles_target() {
        assert_eq!(required_classical_bits_for_post_quantum(128), 256);
    }

    #[test]
    fn test_rsa_security_table() {
        assert_eq!(rsa_classical_security_bits(1024), 80);
        assert_eq!(rsa_classical_security_bits(2048), 112);
        assert_eq!(rsa_classical_security_bits(3072), 128);
        assert_eq!(rsa_classical_security_bits(4096), 152);
    }

    #[test]
    fn test_rsa_security_interpolation_is_monotonic_enough() {
        let a = rsa_classical_security_bits(1536);
        let b = rsa_classical_security_bits(8192);
        assert!(a > 0);
        assert!(b > rsa_classical_security_bits(4096) / 2);
    }

    #[test]
    fn test_shor_feasibility_scales_with_qubits() {
        let few = shor_break_feasibility_years(2048, 1_000, 1.0);
        let many = shor_break_feasibility_years(2048, 1_000_000, 1.0);
        assert!(few > many);
        assert_eq!(
            shor_break_feasibility_years(2048, 0, 1.0),
            f64::INFINITY
        );
    }
}
