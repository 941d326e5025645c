use crate::catalog::{CatalogRecord, Change, ChangeKind, ChangeValue, ItemSummary};
use chrono::{DateTime, Utc};

/// A change computed for one item, not yet bound to a detection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDraft {
    pub kind: ChangeKind,
    pub prior: Option<ChangeValue>,
    pub new: ChangeValue,
}

impl ChangeDraft {
    pub fn into_change(
        self,
        current: &CatalogRecord,
        run_id: i64,
        detected_at: DateTime<Utc>,
    ) -> Change {
        Change {
            id: None,
            item_url: current.url.clone(),
            kind: self.kind,
            prior: self.prior,
            new: self.new,
            detected_at,
            item_title: current.title.clone(),
            run_id,
        }
    }
}

/// Compares an item against its prior state
///
/// No prior yields a single `NewItem`. Otherwise the post-tax price and the
/// availability text are compared independently, so zero, one or two drafts come
/// back. Other fields never produce a change.
pub fn diff_records(prior: Option<&CatalogRecord>, current: &CatalogRecord) -> Vec<ChangeDraft> {
    let Some(prior) = prior else {
        return vec![ChangeDraft {
            kind: ChangeKind::NewItem,
            prior: None,
            new: ChangeValue::Item(ItemSummary::from(current)),
        }];
    };

    let mut drafts = Vec::new();

    if prior.price_incl_tax != current.price_incl_tax {
        drafts.push(ChangeDraft {
            kind: ChangeKind::PriceChange,
            prior: Some(ChangeValue::Price(prior.price_incl_tax)),
            new: ChangeValue::Price(current.price_incl_tax),
        });
    }

    if prior.availability != current.availability {
        drafts.push(ChangeDraft {
            kind: ChangeKind::AvailabilityChange,
            prior: Some(ChangeValue::Availability(prior.availability.clone())),
            new: ChangeValue::Availability(current.availability.clone()),
        });
    }

    drafts
}
