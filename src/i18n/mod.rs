mod messages;

use crate::domain::model::Device;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    /// "es", "es-MX", "es_AR" → Es；未知語系退回 En
    pub fn parse(tag: &str) -> Self {
        let lang = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match lang.as_str() {
            "es" => Locale::Es,
            _ => Locale::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }

    fn separators(&self) -> (char, char) {
        match self {
            Locale::En => (',', '.'),
            Locale::Es => ('.', ','),
        }
    }
}

/// 建議文字與金額格式化
#[derive(Debug, Clone)]
pub struct Catalog {
    locale: Locale,
    currency: String,
    messages: HashMap<&'static str, &'static str>,
    fallback: HashMap<&'static str, &'static str>,
}

impl Catalog {
    pub fn new(locale: Locale, currency: &str) -> Self {
        let fallback: HashMap<_, _> = messages::EN.iter().copied().collect();
        let messages = match locale {
            Locale::En => fallback.clone(),
            Locale::Es => messages::ES.iter().copied().collect(),
        };
        Self {
            locale,
            currency: currency.trim().to_uppercase(),
            messages,
            fallback,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// 找不到翻譯時退回英文，英文也沒有則回傳 key
    pub fn message(&self, key: &str, args: &[(&str, String)]) -> String {
        let template = self
            .messages
            .get(key)
            .or_else(|| self.fallback.get(key))
            .copied()
            .unwrap_or(key);

        let mut out = template.to_string();
        for (name, value) in args {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }

    pub fn money(&self, amount: f64) -> String {
        format_currency(amount, &self.currency, self.locale)
    }

    pub fn percent(&self, ratio: f64) -> String {
        format_percent(ratio, self.locale)
    }

    pub fn weekday(&self, day: Weekday) -> String {
        let key = match day {
            Weekday::Mon => "weekday.mon",
            Weekday::Tue => "weekday.tue",
            Weekday::Wed => "weekday.wed",
            Weekday::Thu => "weekday.thu",
            Weekday::Fri => "weekday.fri",
            Weekday::Sat => "weekday.sat",
            Weekday::Sun => "weekday.sun",
        };
        self.message(key, &[])
    }

    pub fn device(&self, device: Device) -> String {
        let key = match device {
            Device::Mobile => "device.mobile",
            Device::Desktop => "device.desktop",
            Device::Tablet => "device.tablet",
            Device::ConnectedTv => "device.connected_tv",
            Device::Other => "device.other",
        };
        self.message(key, &[])
    }

    /// 出價調整：+25% / -40%
    pub fn modifier(&self, modifier: f64) -> String {
        let pct = format_percent(modifier, self.locale);
        if modifier > 0.0 {
            format!("+{}", pct)
        } else {
            pct
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(Locale::En, "USD")
    }
}

fn group_digits(value: f64, decimals: usize, locale: Locale) -> String {
    let (thousands, decimal) = locale.separators();
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(thousands);
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}{}{}", grouped, decimal, frac),
        None => grouped,
    }
}

fn currency_symbol(currency: &str, locale: Locale) -> Option<&'static str> {
    match (currency, locale) {
        ("USD", Locale::En) => Some("$"),
        ("USD", Locale::Es) => Some("US$"),
        ("EUR", _) => Some("€"),
        ("GBP", _) => Some("£"),
        ("MXN", Locale::Es) => Some("$"),
        ("MXN", Locale::En) => Some("MX$"),
        ("JPY", _) => Some("¥"),
        _ => None,
    }
}

/// en: `$1,234.56`，es: `1.234,56 US$`；未知幣別顯示代碼
pub fn format_currency(amount: f64, currency: &str, locale: Locale) -> String {
    let currency = currency.trim().to_uppercase();
    let decimals = if currency == "JPY" { 0 } else { 2 };
    let digits = group_digits(amount, decimals, locale);
    let sign = if amount < 0.0 && digits.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    match (currency_symbol(&currency, locale), locale) {
        (Some(symbol), Locale::En) => format!("{}{}{}", sign, symbol, digits),
        (Some(symbol), Locale::Es) => format!("{}{} {}", sign, digits, symbol),
        (None, Locale::En) => format!("{}{} {}", sign, currency, digits),
        (None, Locale::Es) => format!("{}{} {}", sign, digits, currency),
    }
}

/// 比例轉百分比：0.125 → en `12.5%`，es `12,5 %`
pub fn format_percent(ratio: f64, locale: Locale) -> String {
    let pct = ratio * 100.0;
    let rounded = (pct * 10.0).round() / 10.0;
    let decimals = if rounded.fract() == 0.0 { 0 } else { 1 };
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = group_digits(rounded, decimals, locale);
    match locale {
        Locale::En => format!("{}{}%", sign, digits),
        Locale::Es => format!("{}{} %", sign, digits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_parsing() {
        assert_eq!(Locale::parse("es-MX"), Locale::Es);
        assert_eq!(Locale::parse("ES_ar"), Locale::Es);
        assert_eq!(Locale::parse("en-US"), Locale::En);
        assert_eq!(Locale::parse("fr"), Locale::En);
        assert_eq!(Locale::parse(""), Locale::En);
    }

    #[test]
    fn test_currency_formatting() {
        assert_eq!(format_currency(1234.5, "USD", Locale::En), "$1,234.50");
        assert_eq!(format_currency(1234.5, "USD", Locale::Es), "1.234,50 US$");
        assert_eq!(format_currency(-99.999, "EUR", Locale::En), "-€100.00");
        assert_eq!(format_currency(1500000.0, "JPY", Locale::En), "¥1,500,000");
        assert_eq!(format_currency(12.0, "CHF", Locale::En), "CHF 12.00");
        assert_eq!(format_currency(-0.001, "USD", Locale::En), "$0.00");
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(format_percent(0.125, Locale::En), "12.5%");
        assert_eq!(format_percent(0.125, Locale::Es), "12,5 %");
        assert_eq!(format_percent(0.5, Locale::En), "50%");
        assert_eq!(format_percent(-0.4, Locale::En), "-40%");
    }

    #[test]
    fn test_message_substitution_and_fallback() {
        let catalog = Catalog::new(Locale::Es, "usd");
        let text = catalog.message("geo.exclude.title", &[("location", "Madrid".to_string())]);
        assert_eq!(text, "Excluir Madrid");
        assert_eq!(catalog.currency(), "USD");

        assert_eq!(catalog.message("missing.key", &[]), "missing.key");
        assert_eq!(Catalog::default().modifier(0.25), "+25%");
        assert_eq!(Catalog::default().modifier(-0.4), "-40%");
        assert_eq!(catalog.weekday(Weekday::Wed), "miércoles");
        assert_eq!(Catalog::default().device(Device::Mobile), "Mobile");
    }

    #[test]
    fn test_every_spanish_key_has_english_source() {
        let en: std::collections::HashSet<_> = messages::EN.iter().map(|(k, _)| *k).collect();
        for (key, _) in messages::ES {
            assert!(en.contains(key), "missing english message for {}", key);
        }
        assert_eq!(messages::EN.len(), messages::ES.len());
    }
}
