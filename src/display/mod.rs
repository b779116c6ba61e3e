//! Plain-text display for the CLI. Only ever sees view models and tags.

use crate::models::{CardViewModel, SectionKind};
use crate::scheduler::{Board, SectionDisplay};
use std::fmt;

pub const EMPTY_STATE: &str = "No listings to show right now.";
pub const LOADING: &str = "Loading listings…";

const RULE: &str = "─────────────────────────────────";

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(banner) = self.banner {
            writeln!(f, "! {}", banner)?;
        }

        for kind in SectionKind::ALL {
            write_section(f, kind, self.section(kind))?;
        }

        if let Some(at) = self.last_success_at {
            writeln!(f, "Updated {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        Ok(())
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, kind: SectionKind, display: &SectionDisplay) -> fmt::Result {
    writeln!(f, "{}", RULE)?;
    writeln!(f, "  {}", kind.title())?;
    writeln!(f, "{}", RULE)?;

    match display {
        SectionDisplay::Loading => writeln!(f, "  {}", LOADING),
        SectionDisplay::Empty => writeln!(f, "  {}", EMPTY_STATE),
        SectionDisplay::Ready { view, .. } if view.cards.is_empty() => {
            writeln!(f, "  {}", EMPTY_STATE)
        }
        SectionDisplay::Ready { view, stale } => {
            for card in &view.cards {
                write_card(f, card)?;
            }
            if view.truncated {
                writeln!(f, "  (showing the {} most recent)", view.cards.len())?;
            }
            if *stale {
                writeln!(f, "  (not refreshed in the last update)")?;
            }
            Ok(())
        }
    }
}

fn write_card(f: &mut fmt::Formatter<'_>, card: &CardViewModel) -> fmt::Result {
    writeln!(f, "  [{}] {}  {}", card.badge, card.address, card.price)?;
    writeln!(f, "      {}", card.features)?;
    if let Some(description) = &card.description {
        writeln!(f, "      {}", description)?;
    }
    writeln!(f, "      {}", card.image.src)
}
