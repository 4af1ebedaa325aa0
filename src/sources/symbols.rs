/// What an unmapped canonical symbol translates to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fallback {
    Passthrough,
    Ticker(&'static str),
}

/// Static canonical symbol -> provider ticker table
#[derive(Clone, Copy, Debug)]
pub struct SymbolMap {
    entries: &'static [(&'static str, &'static str)],
    fallback: Fallback,
}

impl SymbolMap {
    pub const fn new(entries: &'static [(&'static str, &'static str)], fallback: Fallback) -> Self {
        SymbolMap { entries, fallback }
    }

    pub fn translate(&self, symbol: &str) -> String {
        self.entries.iter()
            .find(|(canonical, _)| canonical.eq_ignore_ascii_case(symbol))
            .map(|(_, ticker)| ticker.to_string())
            .unwrap_or_else(|| match self.fallback {
                Fallback::Passthrough => symbol.to_string(),
                Fallback::Ticker(ticker) => ticker.to_string(),
            })
    }
}

pub const YAHOO_SYMBOLS: SymbolMap = SymbolMap::new(
    &[
        ("NAS100", "^NDX"),
        ("NASDAQ", "^IXIC"),
        ("SPX", "^GSPC"),
        ("DJI", "^DJI"),
        ("BTCUSD", "BTC-USD"),
        ("ETHUSD", "ETH-USD"),
    ],
    Fallback::Passthrough,
);

// Index symbols are quoted through their tracking ETFs
pub const ALPHA_VANTAGE_SYMBOLS: SymbolMap = SymbolMap::new(
    &[
        ("NAS100", "QQQ"),
        ("NASDAQ", "QQQ"),
        ("SPX", "SPY"),
        ("DJI", "DIA"),
    ],
    Fallback::Passthrough,
);

// No equity indices on Binance, BTC stands in as the proxy
pub const BINANCE_SYMBOLS: SymbolMap = SymbolMap::new(
    &[
        ("NAS100", "BTCUSDT"),
        ("NASDAQ", "BTCUSDT"),
        ("BTCUSD", "BTCUSDT"),
        ("ETHUSD", "ETHUSDT"),
        ("ADAUSD", "ADAUSDT"),
        ("SOLUSD", "SOLUSDT"),
    ],
    Fallback::Ticker("BTCUSDT"),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_symbols() {
        assert_eq!(YAHOO_SYMBOLS.translate("NAS100"), "^NDX");
        assert_eq!(BINANCE_SYMBOLS.translate("ethusd"), "ETHUSDT");
        assert_eq!(ALPHA_VANTAGE_SYMBOLS.translate("SPX"), "SPY");
    }

    #[test]
    fn unmapped_symbols_use_fallback() {
        assert_eq!(YAHOO_SYMBOLS.translate("AAPL"), "AAPL");
        assert_eq!(BINANCE_SYMBOLS.translate("EURUSD"), "BTCUSDT");
    }
}
