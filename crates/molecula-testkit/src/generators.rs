//! Proptest generators for property-based testing.

use proptest::prelude::*;
use rust_decimal::Decimal;

use molecula_core::{MetaItem, Molecule, Secret, SignOptions, Wallet, AUTH_TOKEN, IDENTITY_TOKEN};

/// Generate a seed phrase.
pub fn seed() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{1,32}".prop_map(String::from)
}

/// Generate a signing position.
pub fn position() -> impl Strategy<Value = String> {
    "[0-9a-f]{64}".prop_map(String::from)
}

/// Generate a token slug that carries no protocol meaning.
pub fn token() -> impl Strategy<Value = String> {
    "[A-Z]{3,8}".prop_filter("reserved token", |t| t != IDENTITY_TOKEN && t != AUTH_TOKEN)
}

/// Generate a millisecond timestamp string.
pub fn created_at() -> impl Strategy<Value = String> {
    (0u64..=1_800_000_000_000u64).prop_map(|ms| ms.to_string())
}

/// Generate one to four meta entries.
pub fn meta_items() -> impl Strategy<Value = Vec<MetaItem>> {
    prop::collection::vec(("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}"), 1..5).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| MetaItem::new(k, v))
            .collect()
    })
}

/// Parameters for generating a value transfer.
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub seed: String,
    pub recipient_seed: String,
    pub token: String,
    pub source_position: String,
    pub recipient_position: String,
    pub remainder_position: String,
    pub balance: Decimal,
    pub amount: Decimal,
    pub created_at: String,
}

impl TransferParams {
    /// The funded source wallet.
    pub fn source(&self) -> Wallet {
        Wallet::new(&Secret::from_seed(&self.seed), &self.token, Some(&self.source_position))
            .expect("generated positions are valid")
            .with_balance(self.balance)
    }
}

impl Arbitrary for TransferParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1i64..=100_000_000i64)
            .prop_flat_map(|balance_cents| (Just(balance_cents), 1i64..=balance_cents))
            .prop_flat_map(|(balance_cents, amount_cents)| {
                (
                    seed(),
                    seed(),
                    token(),
                    position(),
                    position(),
                    position(),
                    Just(Decimal::new(balance_cents, 2)),
                    Just(Decimal::new(amount_cents, 2)),
                    created_at(),
                )
            })
            .prop_filter("remainder must not reuse the source position", |params| {
                params.3 != params.5
            })
            .prop_map(
                |(seed, recipient_seed, token, source, recipient, remainder, balance, amount, ts)| {
                    TransferParams {
                        seed,
                        recipient_seed,
                        token,
                        source_position: source,
                        recipient_position: recipient,
                        remainder_position: remainder,
                        balance,
                        amount,
                        created_at: ts,
                    }
                },
            )
            .boxed()
    }
}

/// Build an unsigned transfer from parameters.
pub fn transfer_from_params(params: &TransferParams) -> Molecule {
    let secret = Secret::from_seed(&params.seed);
    let remainder = Wallet::new(&secret, &params.token, Some(&params.remainder_position))
        .expect("generated positions are valid");
    let recipient = Wallet::new(
        &Secret::from_seed(&params.recipient_seed),
        &params.token,
        Some(&params.recipient_position),
    )
    .expect("generated positions are valid");

    let mut molecule = Molecule::new(secret, params.source())
        .expect("generated wallets are valid")
        .with_remainder(remainder)
        .with_created_at(params.created_at.as_str());
    molecule
        .init_value(&recipient, params.amount)
        .expect("generated amount never exceeds balance");
    molecule
}

/// Build and sign a transfer from parameters.
pub fn signed_transfer_from_params(params: &TransferParams) -> Molecule {
    let mut molecule = transfer_from_params(params);
    molecule
        .sign(SignOptions::default())
        .expect("generated transfer signs");
    molecule
}
