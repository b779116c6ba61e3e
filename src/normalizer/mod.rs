//! Raw upstream records → `CanonicalListing`.
//!
//! Every coercion here is total: a field that cannot be read degrades to its
//! default, the record itself is always produced.

use crate::models::{CanonicalListing, ListingStatus, RawListing};
use scraper::Html;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const ADDRESS_UNAVAILABLE: &str = "Address unavailable";

/// One canonical listing per raw record, same order.
pub fn normalize(raw: &[RawListing]) -> Vec<CanonicalListing> {
    raw.iter().map(normalize_listing).collect()
}

pub fn normalize_listing(raw: &RawListing) -> CanonicalListing {
    let address = raw
        .address
        .as_ref()
        .and_then(parse_address)
        .unwrap_or_else(|| ADDRESS_UNAVAILABLE.to_string());
    let price = raw.price.as_ref().and_then(parse_price);
    let id = raw
        .id
        .as_ref()
        .and_then(parse_id)
        .unwrap_or_else(|| fabricate_id(&address, price));

    CanonicalListing {
        id,
        status: raw
            .status
            .as_ref()
            .and_then(Value::as_str)
            .map(ListingStatus::from_upstream)
            .unwrap_or(ListingStatus::Unknown),
        address,
        price,
        bedrooms: raw.bedrooms.as_ref().and_then(parse_count).unwrap_or(0),
        bathrooms: raw.bathrooms.as_ref().and_then(parse_count).unwrap_or(0),
        area_sqft: raw
            .area_sqft
            .as_ref()
            .and_then(parse_count)
            .filter(|a| *a > 0),
        photos: raw.photos.as_ref().map(parse_photos).unwrap_or_default(),
        description: raw.description.as_ref().and_then(parse_description),
    }
}

// ── Field parsers ─────────────────────────────────────────────────────────────

/// Read a non-negative number from a JSON number or a numeric string.
/// `"$1,250,000"` → 1250000.0 | `"N/A"` → None | `-5` → None
fn parse_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | '_') && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some(n)
}

pub fn parse_price(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    parse_number(v).map(|n| n.round() as u64)
}

/// Bedroom / bathroom / area counts. Fractions round down (2.5 baths → 2).
pub fn parse_count(v: &Value) -> Option<u32> {
    parse_number(v).map(|n| n.floor().min(u32::MAX as f64) as u32)
}

fn parse_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Plain string, or an object of address parts:
/// `{street, city, state, zip}` → "12 Elm St, Sonoma, CA 95476"
fn parse_address(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => non_blank(s),
        Value::Object(map) => {
            let part = |key: &str| map.get(key).and_then(Value::as_str).and_then(non_blank);
            let region = [part("state"), part("zip")]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let joined = [part("street"), part("city"), non_blank(&region)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
            non_blank(&joined)
        }
        _ => None,
    }
}

/// Array of URL strings or `{url|href}` objects, or a lone string.
fn parse_photos(v: &Value) -> Vec<String> {
    let photo_url = |item: &Value| match item {
        Value::String(s) => non_blank(s),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("href"))
            .and_then(Value::as_str)
            .and_then(non_blank),
        _ => None,
    };

    match v {
        Value::Array(items) => items.iter().filter_map(photo_url).collect(),
        other => photo_url(other).into_iter().collect(),
    }
}

/// Markup stripped to text, whitespace collapsed.
fn parse_description(v: &Value) -> Option<String> {
    let s = v.as_str()?;
    let text = if s.contains('<') {
        Html::parse_fragment(s).root_element().text().collect::<String>()
    } else {
        s.to_string()
    };
    non_blank(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Stable id for records upstream sent without one.
fn fabricate_id(address: &str, price: Option<u64>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    hasher.update(b"|");
    if let Some(p) = price {
        hasher.update(p.to_string().as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("gen-{}", &digest[..16])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
