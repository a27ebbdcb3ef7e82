use super::TxReceipt;
use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    /// ERC-20 transfer event.
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Which transfers count as payment. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub token_contract: Option<Address>,
    pub recipient: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub token_contract: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

/// First `Transfer` log in the receipt that satisfies `filter`.
pub fn find_payment(receipt: &TxReceipt, filter: &PaymentFilter) -> Option<Payment> {
    receipt.logs.iter().find_map(|log| {
        if filter.token_contract.is_some_and(|t| t != log.address) {
            return None;
        }
        let decoded = Transfer::decode_log_data(&log.data).ok()?;
        if filter.recipient.is_some_and(|r| r != decoded.to) {
            return None;
        }
        Some(Payment {
            token_contract: log.address,
            from: decoded.from,
            to: decoded.to,
            amount: decoded.value,
        })
    })
}
