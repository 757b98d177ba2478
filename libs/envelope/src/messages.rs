//! Account event messages (`cdc.account.v1`) carried inside envelopes,
//! plus `google.protobuf.Empty`.
//!
//! Hand-written `prost` derives; the matching schema lives in
//! `libs/envelope/proto/cdc/account/v1/events.proto`.

/// `google.protobuf.Empty`. prost maps the well-known type to `()`, which
/// cannot carry a [`prost::Name`], so it gets its own message here.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Empty {}

impl prost::Name for Empty {
    const NAME: &'static str = "Empty";
    const PACKAGE: &'static str = "google.protobuf";

    fn full_name() -> String {
        "google.protobuf.Empty".into()
    }

    fn type_url() -> String {
        format!("{}google.protobuf.Empty", crate::TYPE_URL_PREFIX)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AccountOpened {
    #[prost(string, tag = "1")]
    pub account_id: String,
    #[prost(string, tag = "2")]
    pub display_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FundsDeposited {
    #[prost(string, tag = "1")]
    pub account_id: String,
    /// Amount in minor units (cents).
    #[prost(int64, tag = "2")]
    pub amount_minor: i64,
    #[prost(string, tag = "3")]
    pub currency: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FundsWithdrawn {
    #[prost(string, tag = "1")]
    pub account_id: String,
    #[prost(int64, tag = "2")]
    pub amount_minor: i64,
    #[prost(string, tag = "3")]
    pub currency: String,
}

const ACCOUNT_PACKAGE: &str = "cdc.account.v1";

macro_rules! impl_name {
    ($ty:ident) => {
        impl prost::Name for $ty {
            const NAME: &'static str = stringify!($ty);
            const PACKAGE: &'static str = ACCOUNT_PACKAGE;

            fn full_name() -> String {
                format!("{}.{}", ACCOUNT_PACKAGE, stringify!($ty))
            }

            fn type_url() -> String {
                format!("{}{}.{}", crate::TYPE_URL_PREFIX, ACCOUNT_PACKAGE, stringify!($ty))
            }
        }
    };
}

impl_name!(AccountOpened);
impl_name!(FundsDeposited);
impl_name!(FundsWithdrawn);
