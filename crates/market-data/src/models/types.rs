use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Provider-issued instrument token (e.g. "2885"), unique within the catalog
pub type SymbolToken = String;

/// Underlying name shared by a stock's equity, futures and options rows (e.g. "RELIANCE")
pub type Underlying = String;
