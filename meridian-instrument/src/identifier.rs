use crate::{
    base36,
    error::IdentifierError,
    market::MarketRegistry,
    security_type::{OptionRight, OptionStyle, SecurityType},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Packed-field widths, per `spec.md` §3.
const WIDTH_SECURITY_TYPE: u64 = 100;
const WIDTH_MARKET: u64 = 1_000;
const WIDTH_STRIKE_SCALE: u64 = 100;
const WIDTH_STRIKE_MANTISSA: u64 = 1_000_000;
const WIDTH_OPTION_STYLE: u64 = 10;
const WIDTH_DATE: u64 = 100_000;
const WIDTH_PUT_CALL: u64 = 10;

// Cumulative offsets. Security type is the least-significant field, put/call the most, so
// that the widest fields (strike mantissa, date) sit where the available `u64` headroom is.
const OFFSET_SECURITY_TYPE: u64 = 1;
const OFFSET_MARKET: u64 = OFFSET_SECURITY_TYPE * WIDTH_SECURITY_TYPE;
const OFFSET_STRIKE_SCALE: u64 = OFFSET_MARKET * WIDTH_MARKET;
const OFFSET_STRIKE_MANTISSA: u64 = OFFSET_STRIKE_SCALE * WIDTH_STRIKE_SCALE;
const OFFSET_OPTION_STYLE: u64 = OFFSET_STRIKE_MANTISSA * WIDTH_STRIKE_MANTISSA;
const OFFSET_DATE: u64 = OFFSET_OPTION_STYLE * WIDTH_OPTION_STYLE;
const OFFSET_PUT_CALL: u64 = OFFSET_DATE * WIDTH_DATE;

/// Anchor scale used when normalizing a strike price into (mantissa, scale). `spec.md` §3/§4.A.
const STRIKE_DEFAULT_SCALE: u32 = 4;

/// Days-since-epoch anchor for the OA-date field, matching the OLE Automation date epoch.
fn date_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid calendar date")
}

/// Stable, parseable identity of a tradable instrument.
///
/// Two identifiers are equal iff their `symbol` and packed `properties` are equal; the type
/// derives `Eq`/`Hash` accordingly so it can key maps the way `spec.md` §3 requires.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct SecurityIdentifier {
    symbol: String,
    properties: u64,
}

impl SecurityIdentifier {
    /// The identifier with no symbol and zeroed properties (`spec.md` §4.A).
    pub fn empty() -> Self {
        Self {
            symbol: String::new(),
            properties: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn properties(&self) -> u64 {
        self.properties
    }

    fn security_type_code(&self) -> u8 {
        ((self.properties / OFFSET_SECURITY_TYPE) % WIDTH_SECURITY_TYPE) as u8
    }

    pub fn security_type(&self) -> Result<SecurityType, IdentifierError> {
        SecurityType::from_code(self.security_type_code())
    }

    pub fn market_code(&self) -> u16 {
        (((self.properties / OFFSET_MARKET) % WIDTH_MARKET) as u16)
    }

    pub fn market(&self, registry: &MarketRegistry) -> Option<String> {
        registry.decode(self.market_code())
    }

    fn require_option(&self, field: &'static str) -> Result<(), IdentifierError> {
        match self.security_type() {
            Ok(SecurityType::Option) => Ok(()),
            Ok(other) => Err(IdentifierError::InvalidOperation {
                field,
                security_type: other.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub fn option_right(&self) -> Result<OptionRight, IdentifierError> {
        self.require_option("option right")?;
        let code = ((self.properties / OFFSET_PUT_CALL) % WIDTH_PUT_CALL) as u8;
        OptionRight::from_code(code)
    }

    pub fn option_style(&self) -> Result<OptionStyle, IdentifierError> {
        self.require_option("option style")?;
        let code = ((self.properties / OFFSET_OPTION_STYLE) % WIDTH_OPTION_STYLE) as u8;
        OptionStyle::from_code(code)
    }

    pub fn strike_price(&self) -> Result<Decimal, IdentifierError> {
        self.require_option("strike price")?;
        let mantissa = (self.properties / OFFSET_STRIKE_MANTISSA) % WIDTH_STRIKE_MANTISSA;
        let scale = (self.properties / OFFSET_STRIKE_SCALE) % WIDTH_STRIKE_SCALE;
        Ok(decode_strike(mantissa, scale as u32))
    }

    /// OA-date (expiry for options, listing date otherwise). Not applicable to Forex/Cfd.
    pub fn date(&self) -> Result<NaiveDate, IdentifierError> {
        match self.security_type() {
            Ok(SecurityType::Forex) | Ok(SecurityType::Cfd) => {
                return Err(IdentifierError::InvalidOperation {
                    field: "date",
                    security_type: self.security_type()?.to_string(),
                });
            }
            Err(e) => return Err(e),
            _ => {}
        }
        let days = (self.properties / OFFSET_DATE) % WIDTH_DATE;
        Ok(date_epoch() + chrono::Duration::days(days as i64))
    }

    /// Serialize as `"<SYMBOL> <BASE36(properties)>"`, unpadded. `parse` inverts this exactly.
    pub fn to_string_unpadded(&self) -> String {
        format!("{} {}", self.symbol, base36::encode(self.properties))
    }

    /// Fixed-width persistence form: the natural serialization, zero-padded on the right to
    /// 40 characters (`spec.md` §6). Not guaranteed round-trippable via [`Self::parse`] unless
    /// the caller trims the padding back to the natural length first.
    pub fn to_fixed_width_string(&self) -> String {
        let natural = self.to_string_unpadded();
        let mut padded = natural;
        while padded.len() < 40 {
            padded.push('0');
        }
        padded
    }

    /// Parse `"<SYMBOL> <BASE36>"`. Splits on the first space only; the base-36 component may
    /// be of any length, and is decoded case-insensitively.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let mut parts = s.splitn(2, ' ');
        let symbol = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentifierError::Format(s.to_string()))?;
        let properties_str = parts
            .next()
            .ok_or_else(|| IdentifierError::Format(s.to_string()))?;

        let properties = base36::decode(properties_str)
            .ok_or_else(|| IdentifierError::Format(s.to_string()))?;

        Ok(Self {
            symbol: symbol.to_string(),
            properties,
        })
    }

    fn validate_symbol(symbol: &str) -> Result<String, IdentifierError> {
        if symbol.is_empty() || symbol.len() > 12 {
            return Err(IdentifierError::Format(format!(
                "symbol must be 1..=12 chars: {symbol}"
            )));
        }
        if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdentifierError::Format(format!(
                "symbol must be alphanumeric: {symbol}"
            )));
        }
        Ok(symbol.to_uppercase())
    }

    fn encode_market(registry: &MarketRegistry, market: &str) -> Result<u16, IdentifierError> {
        registry
            .encode(market)
            .ok_or_else(|| IdentifierError::UnknownMarket(market.to_lowercase()))
    }

    fn pack(fields: &[(u64, u64, u64)]) -> Result<u64, IdentifierError> {
        let mut value: u64 = 0;
        for &(field_value, width, offset) in fields {
            if field_value >= width {
                return Err(IdentifierError::OutOfRange {
                    field: "packed field",
                    value: field_value as i64,
                    width: width as i64,
                });
            }
            let contribution = field_value
                .checked_mul(offset)
                .ok_or_else(|| IdentifierError::Format("packed field overflow".to_string()))?;
            value = value
                .checked_add(contribution)
                .ok_or_else(|| IdentifierError::Format("packed field overflow".to_string()))?;
        }
        Ok(value)
    }

    /// `spec.md` §4.A `generateEquity`.
    pub fn generate_equity(
        date: NaiveDate,
        symbol: &str,
        market: &str,
        registry: &MarketRegistry,
    ) -> Result<Self, IdentifierError> {
        let symbol = Self::validate_symbol(symbol)?;
        let market_code = Self::encode_market(registry, market)?;
        let days = (date - date_epoch()).num_days();
        if !(0..WIDTH_DATE as i64).contains(&days) {
            return Err(IdentifierError::OutOfRange {
                field: "date",
                value: days,
                width: WIDTH_DATE as i64,
            });
        }

        let properties = Self::pack(&[
            (SecurityType::Equity.to_code() as u64, WIDTH_SECURITY_TYPE, OFFSET_SECURITY_TYPE),
            (market_code as u64, WIDTH_MARKET, OFFSET_MARKET),
            (days as u64, WIDTH_DATE, OFFSET_DATE),
        ])?;

        Ok(Self { symbol, properties })
    }

    /// `spec.md` §4.A `generateOption`.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_option(
        expiry: NaiveDate,
        underlying: &str,
        market: &str,
        strike: Decimal,
        right: OptionRight,
        style: OptionStyle,
        registry: &MarketRegistry,
    ) -> Result<Self, IdentifierError> {
        let symbol = Self::validate_symbol(underlying)?;
        let market_code = Self::encode_market(registry, market)?;
        let days = (expiry - date_epoch()).num_days();
        if !(0..WIDTH_DATE as i64).contains(&days) {
            return Err(IdentifierError::OutOfRange {
                field: "date",
                value: days,
                width: WIDTH_DATE as i64,
            });
        }
        let (mantissa, scale) = encode_strike(strike)?;

        let properties = Self::pack(&[
            (SecurityType::Option.to_code() as u64, WIDTH_SECURITY_TYPE, OFFSET_SECURITY_TYPE),
            (market_code as u64, WIDTH_MARKET, OFFSET_MARKET),
            (scale as u64, WIDTH_STRIKE_SCALE, OFFSET_STRIKE_SCALE),
            (mantissa, WIDTH_STRIKE_MANTISSA, OFFSET_STRIKE_MANTISSA),
            (style.to_code() as u64, WIDTH_OPTION_STYLE, OFFSET_OPTION_STYLE),
            (days as u64, WIDTH_DATE, OFFSET_DATE),
            (right.to_code() as u64, WIDTH_PUT_CALL, OFFSET_PUT_CALL),
        ])?;

        Ok(Self { symbol, properties })
    }

    /// `spec.md` §4.A `generateForex`.
    pub fn generate_forex(symbol: &str, market: &str, registry: &MarketRegistry) -> Result<Self, IdentifierError> {
        Self::generate_no_date(symbol, market, SecurityType::Forex, registry)
    }

    /// `spec.md` §4.A `generateCfd`.
    pub fn generate_cfd(symbol: &str, market: &str, registry: &MarketRegistry) -> Result<Self, IdentifierError> {
        Self::generate_no_date(symbol, market, SecurityType::Cfd, registry)
    }

    /// `spec.md` §4.A `generateBase`.
    pub fn generate_base(symbol: &str, market: &str, registry: &MarketRegistry) -> Result<Self, IdentifierError> {
        Self::generate_no_date(symbol, market, SecurityType::Base, registry)
    }

    fn generate_no_date(
        symbol: &str,
        market: &str,
        security_type: SecurityType,
        registry: &MarketRegistry,
    ) -> Result<Self, IdentifierError> {
        let symbol = Self::validate_symbol(symbol)?;
        let market_code = Self::encode_market(registry, market)?;

        let properties = Self::pack(&[
            (security_type.to_code() as u64, WIDTH_SECURITY_TYPE, OFFSET_SECURITY_TYPE),
            (market_code as u64, WIDTH_MARKET, OFFSET_MARKET),
        ])?;

        Ok(Self { symbol, properties })
    }
}

impl std::fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_unpadded())
    }
}

/// Normalize `strike` into `(mantissa, scale)` anchored at [`STRIKE_DEFAULT_SCALE`] decimal
/// places, stripping trailing factors of ten. `spec.md` §4.A.
fn encode_strike(strike: Decimal) -> Result<(u64, u32), IdentifierError> {
    if strike <= Decimal::ZERO {
        return Err(IdentifierError::Format(format!(
            "strike price must be positive: {strike}"
        )));
    }

    let scaled = strike * Decimal::from(10u64.pow(STRIKE_DEFAULT_SCALE));
    let mut mantissa: u64 = scaled.trunc().try_into().map_err(|_| {
        IdentifierError::Format(format!("strike price does not normalize to an integer: {strike}"))
    })?;
    if Decimal::from(mantissa) != scaled {
        return Err(IdentifierError::Format(format!(
            "strike price has more than {STRIKE_DEFAULT_SCALE} decimal places: {strike}"
        )));
    }

    let mut stripped = 0u32;
    while mantissa % 10 == 0 && mantissa != 0 {
        mantissa /= 10;
        stripped += 1;
    }

    if mantissa >= WIDTH_STRIKE_MANTISSA {
        return Err(IdentifierError::OutOfRange {
            field: "strike mantissa",
            value: mantissa as i64,
            width: WIDTH_STRIKE_MANTISSA as i64,
        });
    }

    Ok((mantissa, stripped))
}

/// Inverse of [`encode_strike`]: `strike = mantissa * 10^(scale - STRIKE_DEFAULT_SCALE)`.
fn decode_strike(mantissa: u64, scale: u32) -> Decimal {
    let mut value = Decimal::from(mantissa);
    if scale >= STRIKE_DEFAULT_SCALE {
        value *= Decimal::from(10u64.pow(scale - STRIKE_DEFAULT_SCALE));
    } else {
        value /= Decimal::from(10u64.pow(STRIKE_DEFAULT_SCALE - scale));
    }
    value
}
