use crate::error::TransportError;

pub const SOLANA_ADDRESS_MIN_LEN: usize = 32;
pub const SOLANA_ADDRESS_MAX_LEN: usize = 44;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Shape check only: base58 alphabet and the length range of a 32-byte key.
pub fn validate_solana_address(address: &str) -> Result<(), TransportError> {
    if address.is_empty() {
        return Err(TransportError::InvalidAddress(
            "address must not be empty".to_string(),
        ));
    }

    let len = address.chars().count();
    if !(SOLANA_ADDRESS_MIN_LEN..=SOLANA_ADDRESS_MAX_LEN).contains(&len) {
        return Err(TransportError::InvalidAddress(format!(
            "address length must be in {SOLANA_ADDRESS_MIN_LEN}..={SOLANA_ADDRESS_MAX_LEN}; got {len}"
        )));
    }

    if let Some(bad) = address.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
        return Err(TransportError::InvalidAddress(format!(
            "character '{bad}' is not in the base58 alphabet"
        )));
    }

    Ok(())
}

#[must_use]
pub fn format_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";
    const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    #[test]
    fn accepts_well_formed_addresses() {
        validate_solana_address(SYSTEM_PROGRAM).expect("32 chars");
        validate_solana_address(WALLET).expect("44 chars");
    }

    #[test]
    fn rejects_ambiguous_base58_characters() {
        let with_zero = format!("0{}", &WALLET[1..]);
        let err = validate_solana_address(&with_zero).expect_err("0 is not base58");
        assert!(err.to_string().contains("'0'"));

        let with_l = format!("l{}", &WALLET[1..]);
        assert!(validate_solana_address(&with_l).is_err());
    }

    #[test]
    fn rejects_out_of_range_lengths() {
        assert!(validate_solana_address(&SYSTEM_PROGRAM[..31]).is_err());
        assert!(validate_solana_address(&format!("{WALLET}1")).is_err());
        assert!(validate_solana_address("").is_err());
    }

    #[test]
    fn formats_head_and_tail() {
        assert_eq!(format_address(WALLET), "9xQe...VFin");
        assert_eq!(format_address("short"), "short");
    }
}
