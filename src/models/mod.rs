use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Section / status ──────────────────────────────────────────────────────────

/// One of the two independently rendered listing categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Active,
    Sold,
}

impl SectionKind {
    pub const ALL: [SectionKind; 2] = [SectionKind::Active, SectionKind::Sold];

    /// Value sent as the `status` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            SectionKind::Active => "Active",
            SectionKind::Sold => "Sold",
        }
    }

    pub fn status(self) -> ListingStatus {
        match self {
            SectionKind::Active => ListingStatus::Active,
            SectionKind::Sold => ListingStatus::Sold,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionKind::Active => "Current Listings",
            SectionKind::Sold => "Past Sales",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingStatus {
    Active,
    Sold,
    Pending,
    Unknown,
}

impl ListingStatus {
    /// Case-insensitive mapping of free-form upstream status text.
    /// "Active" → Active | "closed" → Sold | "Withdrawn" → Unknown
    pub fn from_upstream(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "for sale" | "new" | "coming soon" => ListingStatus::Active,
            "sold" | "closed" => ListingStatus::Sold,
            "pending" | "contingent" | "under contract" => ListingStatus::Pending,
            _ => ListingStatus::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
            ListingStatus::Pending => "PENDING",
            ListingStatus::Unknown => "UNKNOWN",
        }
    }
}

// ── Upstream envelope ─────────────────────────────────────────────────────────

/// Proxy response body: `{ success, listings, count }`.
/// Typed strictly so any shape mismatch fails deserialization; individual
/// listings stay untyped until normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingsEnvelope {
    pub success: bool,
    pub listings: Vec<Value>,
    pub count: u64,
}

// ── Raw upstream listing ──────────────────────────────────────────────────────

/// Upstream listing record. Shape is not guaranteed: every field is kept as an
/// untyped JSON value and coerced later by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawListing {
    pub id: Option<Value>,
    pub address: Option<Value>,
    pub price: Option<Value>,
    pub bedrooms: Option<Value>,
    pub bathrooms: Option<Value>,
    pub area_sqft: Option<Value>,
    pub photos: Option<Value>,
    pub description: Option<Value>,
    pub status: Option<Value>,
    pub extras: Map<String, Value>,
}

const ID_KEYS: &[&str] = &["id", "mlsId", "mls_id", "listingId"];
const BEDROOM_KEYS: &[&str] = &["bedrooms", "beds"];
const BATHROOM_KEYS: &[&str] = &["bathrooms", "baths"];
const AREA_KEYS: &[&str] = &["areaSqft", "sqft", "livingArea"];
const PHOTO_KEYS: &[&str] = &["photos", "images"];

impl RawListing {
    /// Build from any JSON value. Non-objects degrade to an empty record.
    /// When several aliases of one field are present the first listed wins;
    /// nulls count as absent. Unrecognised keys land in `extras`.
    pub fn from_json(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return RawListing::default();
        };

        let mut take = |keys: &[&str]| {
            let mut found = None;
            for key in keys {
                if let Some(v) = map.remove(*key) {
                    if found.is_none() && !v.is_null() {
                        found = Some(v);
                    }
                }
            }
            found
        };

        let id = take(ID_KEYS);
        let address = take(&["address"]);
        let price = take(&["price"]);
        let bedrooms = take(BEDROOM_KEYS);
        let bathrooms = take(BATHROOM_KEYS);
        let area_sqft = take(AREA_KEYS);
        let photos = take(PHOTO_KEYS);
        let description = take(&["description"]);
        let status = take(&["status"]);

        RawListing {
            id,
            address,
            price,
            bedrooms,
            bathrooms,
            area_sqft,
            photos,
            description,
            status,
            extras: map,
        }
    }
}

// ── Canonical listing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub id: String,
    pub status: ListingStatus,
    pub address: String,
    pub price: Option<u64>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area_sqft: Option<u32>,
    pub photos: Vec<String>,
    pub description: Option<String>,
}

// ── View models ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
    pub lazy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardViewModel {
    pub id: String,
    pub kind: SectionKind,
    pub badge: &'static str,
    pub address: String,
    pub price: String,
    pub features: String,
    pub description: Option<String>,
    pub image: ImageRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionViewModel {
    pub kind: SectionKind,
    pub cards: Vec<CardViewModel>,
    pub truncated: bool,
}
