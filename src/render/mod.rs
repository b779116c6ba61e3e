//! Canonical listings → section view models. Pure functions only.

use crate::config::RenderConfig;
use crate::models::{
    CanonicalListing, CardViewModel, ImageRef, ListingStatus, SectionKind, SectionViewModel,
};
use crate::utils::{fmt_thousands, truncate_chars};
use std::collections::HashSet;

pub const PRICE_ON_REQUEST: &str = "Price upon request";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub cap: usize,
    pub description_limit: usize,
    pub placeholder_image: String,
    pub dedupe: bool,
}

impl RenderSettings {
    pub fn with_cap(cap: usize) -> Self {
        let defaults = RenderConfig::default();
        Self {
            cap,
            description_limit: defaults.description_limit,
            placeholder_image: defaults.placeholder_image,
            dedupe: false,
        }
    }

    pub fn for_section(config: &RenderConfig, kind: SectionKind) -> Self {
        Self {
            cap: match kind {
                SectionKind::Active => config.active_cap,
                SectionKind::Sold => config.sold_cap,
            },
            description_limit: config.description_limit,
            placeholder_image: config.placeholder_image.clone(),
            dedupe: config.dedupe,
        }
    }
}

pub fn render(listings: &[CanonicalListing], kind: SectionKind, cap: usize) -> SectionViewModel {
    render_with(listings, kind, &RenderSettings::with_cap(cap))
}

/// Filter → (dedupe) → cap → map to cards. Input order is kept.
pub fn render_with(
    listings: &[CanonicalListing],
    kind: SectionKind,
    settings: &RenderSettings,
) -> SectionViewModel {
    let cap = settings.cap.max(1);
    let mut seen = HashSet::new();

    let retained: Vec<&CanonicalListing> = listings
        .iter()
        .filter(|l| belongs_to(l.status, kind))
        .filter(|&l| !settings.dedupe || seen.insert(l.id.as_str()))
        .collect();

    let truncated = retained.len() > cap;
    let cards = retained
        .into_iter()
        .take(cap)
        .map(|l| card(l, kind, settings))
        .collect();

    SectionViewModel {
        kind,
        cards,
        truncated,
    }
}

/// Unknown statuses stay in whichever section asked for them; pending
/// listings are still current listings.
fn belongs_to(status: ListingStatus, kind: SectionKind) -> bool {
    status == kind.status()
        || status == ListingStatus::Unknown
        || (kind == SectionKind::Active && status == ListingStatus::Pending)
}

pub fn card(listing: &CanonicalListing, kind: SectionKind, settings: &RenderSettings) -> CardViewModel {
    let badge = match (kind, listing.status) {
        (SectionKind::Active, ListingStatus::Pending) => ListingStatus::Pending.label(),
        _ => kind.status().label(),
    };

    let src = listing
        .photos
        .first()
        .cloned()
        .unwrap_or_else(|| settings.placeholder_image.clone());

    CardViewModel {
        id: listing.id.clone(),
        kind,
        badge,
        address: listing.address.clone(),
        price: format_price(listing.price),
        features: format_features(listing),
        description: listing
            .description
            .as_deref()
            .map(|d| truncate_chars(d, settings.description_limit)),
        image: ImageRef {
            src,
            alt: listing.address.clone(),
            lazy: true,
        },
    }
}

/// Whole US dollars. A missing or zero price reads "Price upon request".
pub fn format_price(price: Option<u64>) -> String {
    match price {
        Some(p) if p > 0 => format!("${}", fmt_thousands(p)),
        _ => PRICE_ON_REQUEST.to_string(),
    }
}

/// "3 bed • 2 bath • 1,850 sqft"
pub fn format_features(listing: &CanonicalListing) -> String {
    let area = listing
        .area_sqft
        .map(|a| format!("{} sqft", fmt_thousands(a as u64)))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{} bed • {} bath • {}",
        listing.bedrooms, listing.bathrooms, area
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, status: ListingStatus) -> CanonicalListing {
        CanonicalListing {
            id: id.to_string(),
            status,
            address: format!("{} Vineyard Ln", id),
            price: Some(450_000),
            bedrooms: 3,
            bathrooms: 2,
            area_sqft: Some(1850),
            photos: vec![format!("https://img.test/{}.jpg", id)],
            description: None,
        }
    }

    fn sold(n: usize) -> Vec<CanonicalListing> {
        (0..n)
            .map(|i| listing(&format!("S{}", i), ListingStatus::Sold))
            .collect()
    }

    #[test]
    fn test_cap_truncates_in_upstream_order() {
        let view = render(&sold(10), SectionKind::Sold, 6);
        assert_eq!(view.cards.len(), 6);
        assert!(view.truncated);
        let ids: Vec<_> = view.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["S0", "S1", "S2", "S3", "S4", "S5"]);
    }

    #[test]
    fn test_under_cap_not_truncated() {
        let view = render(&sold(3), SectionKind::Sold, 6);
        assert_eq!(view.cards.len(), 3);
        assert!(!view.truncated);

        let exact = render(&sold(6), SectionKind::Sold, 6);
        assert_eq!(exact.cards.len(), 6);
        assert!(!exact.truncated);
    }

    #[test]
    fn test_render_is_pure() {
        let input = sold(8);
        assert_eq!(
            render(&input, SectionKind::Sold, 6),
            render(&input, SectionKind::Sold, 6)
        );
    }

    #[test]
    fn test_filter_is_idempotent_on_prefiltered_input() {
        let mixed = vec![
            listing("A1", ListingStatus::Active),
            listing("S1", ListingStatus::Sold),
            listing("P1", ListingStatus::Pending),
            listing("U1", ListingStatus::Unknown),
        ];
        let active = render(&mixed, SectionKind::Active, 10);
        let ids: Vec<_> = active.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["A1", "P1", "U1"]);
        assert_eq!(active.cards[1].badge, "PENDING");
        assert_eq!(active.cards[2].badge, "ACTIVE");

        let sold_view = render(&mixed, SectionKind::Sold, 10);
        let ids: Vec<_> = sold_view.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["S1", "U1"]);

        let prefiltered: Vec<_> = mixed
            .iter()
            .filter(|l| matches!(l.status, ListingStatus::Sold | ListingStatus::Unknown))
            .cloned()
            .collect();
        assert_eq!(render(&prefiltered, SectionKind::Sold, 10), sold_view);
    }

    #[test]
    fn test_duplicates_kept_unless_dedupe() {
        let dupes = vec![
            listing("D", ListingStatus::Sold),
            listing("D", ListingStatus::Sold),
        ];
        assert_eq!(render(&dupes, SectionKind::Sold, 6).cards.len(), 2);

        let settings = RenderSettings {
            dedupe: true,
            ..RenderSettings::with_cap(6)
        };
        assert_eq!(render_with(&dupes, SectionKind::Sold, &settings).cards.len(), 1);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Some(450_000)), "$450,000");
        assert_eq!(format_price(Some(1_250_000)), "$1,250,000");
        assert_eq!(format_price(None), PRICE_ON_REQUEST);
        assert_eq!(format_price(Some(0)), PRICE_ON_REQUEST);
    }

    #[test]
    fn test_description_truncation() {
        let mut l = listing("A1", ListingStatus::Active);
        l.description = Some("x".repeat(150));
        let c = card(&l, SectionKind::Active, &RenderSettings::with_cap(6));
        let d = c.description.unwrap();
        assert_eq!(d, format!("{}...", "x".repeat(100)));

        l.description = Some("y".repeat(50));
        let c = card(&l, SectionKind::Active, &RenderSettings::with_cap(6));
        assert_eq!(c.description.unwrap(), "y".repeat(50));
    }

    #[test]
    fn test_card_fields() {
        let mut l = listing("A1", ListingStatus::Active);
        let c = card(&l, SectionKind::Active, &RenderSettings::with_cap(6));
        assert_eq!(c.badge, "ACTIVE");
        assert_eq!(c.price, "$450,000");
        assert_eq!(c.features, "3 bed • 2 bath • 1,850 sqft");
        assert_eq!(c.image.src, "https://img.test/A1.jpg");
        assert_eq!(c.image.alt, "A1 Vineyard Ln");
        assert!(c.image.lazy);

        l.photos.clear();
        l.area_sqft = None;
        let c = card(&l, SectionKind::Sold, &RenderSettings::with_cap(6));
        assert_eq!(c.badge, "SOLD");
        assert_eq!(c.image.src, "images/placeholder.jpg");
        assert_eq!(c.features, "3 bed • 2 bath • N/A");
    }

    #[test]
    fn test_zero_cap_treated_as_one() {
        let view = render(&sold(2), SectionKind::Sold, 0);
        assert_eq!(view.cards.len(), 1);
        assert!(view.truncated);
    }
}
