use alloy::primitives::{Address, Signature};

/// Checks an EIP-191 personal-sign signature over `message` against `address`.
pub fn verify_wallet_signature(
    address: &Address,
    message: &str,
    signature_hex: &str,
) -> Result<(), String> {
    let raw = signature_hex.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).map_err(|_| "signature is not valid hex".to_string())?;
    if bytes.len() != 65 {
        return Err(format!("signature must be 65 bytes, got {}", bytes.len()));
    }
    let signature = Signature::try_from(bytes.as_slice())
        .map_err(|e| format!("malformed signature: {}", e))?;
    let recovered = signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| format!("signature recovery failed: {}", e))?;
    if &recovered != address {
        return Err("signature was not produced by this wallet".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::Signer;

    #[tokio::test]
    async fn accepts_own_signature_and_rejects_others() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let message = "claim history for my wallet";
        let sig = signer.sign_message(message.as_bytes()).await.unwrap();
        let sig_hex = format!("0x{}", hex::encode(sig.as_bytes()));

        assert!(verify_wallet_signature(&signer.address(), message, &sig_hex).is_ok());
        assert!(verify_wallet_signature(&other.address(), message, &sig_hex).is_err());
        assert!(verify_wallet_signature(&signer.address(), "tampered", &sig_hex).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let a = Address::repeat_byte(1);
        assert!(verify_wallet_signature(&a, "m", "zz").is_err());
        assert!(verify_wallet_signature(&a, "m", "0x1234").is_err());
    }
}
