//! Deterministic pricing analysis.
//!
//! Explains the occupancy pricing policy for the group in question and,
//! when rates are configured and the stay is fully described, quotes a
//! total without any generation.

use std::sync::Arc;

use concierge_core::config::PricingConfig;
use concierge_core::{CapacityMap, CottageRegistry, OccupancyBand};
use serde::{Deserialize, Serialize};

use crate::entity::ExtractedEntities;
use crate::types::RetrievedDocument;

/// A computed price estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub nights: u32,
    pub group_size: u32,
    pub weekend: bool,
    pub nightly_rate: u32,
    pub extra_guests: u32,
    pub extra_guest_rate: u32,
    pub total: u64,
    pub currency: String,
}

impl PriceQuote {
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Estimated total for {} night{} ({} rate): {} {}.",
            self.nights,
            if self.nights == 1 { "" } else { "s" },
            if self.weekend { "weekend" } else { "weekday" },
            self.currency,
            self.total
        );
        text.push_str(&format!(
            " That is {} {} per night",
            self.currency, self.nightly_rate
        ));
        if self.extra_guests > 0 {
            text.push_str(&format!(
                " plus {} {} per night for each of {} extra guest{}",
                self.currency,
                self.extra_guest_rate,
                self.extra_guests,
                if self.extra_guests == 1 { "" } else { "s" }
            ));
        }
        text.push('.');
        text
    }
}

/// Pricing explanation for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingAnalysis {
    pub group_size: Option<u32>,
    pub cottage_id: Option<String>,
    pub band: Option<OccupancyBand>,
    pub quote: Option<PriceQuote>,
    pub explanation: String,
}

impl PricingAnalysis {
    /// Whether the analysis answers the question on its own.
    pub fn is_resolved(&self) -> bool {
        self.quote.is_some()
    }

    pub fn to_document(&self) -> Option<RetrievedDocument> {
        if self.explanation.is_empty() {
            return None;
        }
        let mut doc = RetrievedDocument::structured_analysis("pricing", self.explanation.clone());
        if let Some(id) = &self.cottage_id {
            doc = doc.with_metadata("cottage", id.clone());
        }
        Some(doc)
    }
}

pub struct PricingReasoner {
    registry: Arc<CottageRegistry>,
    config: PricingConfig,
}

impl PricingReasoner {
    pub fn new(registry: Arc<CottageRegistry>, config: PricingConfig) -> Self {
        Self { registry, config }
    }

    fn capacity(&self) -> CapacityMap {
        self.registry.capacity()
    }

    pub fn analyze(&self, entities: &ExtractedEntities) -> PricingAnalysis {
        let map = self.capacity();
        let band = entities.group_size.map(|g| map.classify(g));
        let mut lines = vec![format!(
            "The base price covers up to {} guests per cottage; {} to {} guests pay an extra-guest charge and need confirmation; more than {} guests need separate bookings.",
            map.base_capacity,
            map.base_capacity + 1,
            map.max_capacity,
            map.max_capacity
        )];

        if let (Some(group), Some(band)) = (entities.group_size, band) {
            lines.push(self.group_line(group, band));
        }
        if let Some(rates) = self.rates_line() {
            lines.push(rates);
        }

        let quote = self.quote(entities, band);
        if let Some(q) = &quote {
            lines.push(q.summary());
        }

        PricingAnalysis {
            group_size: entities.group_size,
            cottage_id: entities.cottage_number.clone(),
            band,
            quote,
            explanation: lines.join("\n"),
        }
    }

    fn group_line(&self, group: u32, band: OccupancyBand) -> String {
        let map = self.capacity();
        match band {
            OccupancyBand::Comfortable => {
                format!("A group of {} is covered by the base price.", group)
            }
            OccupancyBand::ConfirmationRequired => {
                let extra = group - map.base_capacity;
                let mut line = format!(
                    "A group of {} is {} above the base capacity, so an extra-guest charge applies and the booking needs confirmation",
                    group, extra
                );
                if let Some(rate) = self.config.extra_guest_rate {
                    line.push_str(&format!(
                        " ({} {} per extra guest per night)",
                        self.config.currency, rate
                    ));
                }
                line.push('.');
                line
            }
            OccupancyBand::OverCapacity => format!(
                "A group of {} exceeds the maximum of {} guests per cottage and needs {} separate bookings.",
                group,
                map.max_capacity,
                map.units_needed(group)
            ),
        }
    }

    fn rates_line(&self) -> Option<String> {
        let currency = &self.config.currency;
        match (self.config.weekday_rate, self.config.weekend_rate) {
            (Some(wd), Some(we)) => Some(format!(
                "Nightly rate per cottage: {} {} on weekdays, {} {} on weekends.",
                currency, wd, currency, we
            )),
            (Some(wd), None) => Some(format!("Nightly rate per cottage: {} {}.", currency, wd)),
            (None, Some(we)) => {
                Some(format!("Weekend nightly rate per cottage: {} {}.", currency, we))
            }
            (None, None) => None,
        }
    }

    fn quote(
        &self,
        entities: &ExtractedEntities,
        band: Option<OccupancyBand>,
    ) -> Option<PriceQuote> {
        let nights = entities.nights.filter(|n| *n > 0)?;
        let group = entities.group_size?;
        if matches!(band, None | Some(OccupancyBand::OverCapacity)) {
            return None;
        }
        let weekend = entities.dates.is_weekend_stay();
        let nightly_rate = if weekend {
            self.config.weekend_rate?
        } else {
            self.config.weekday_rate?
        };

        let extra_guests = group.saturating_sub(self.capacity().base_capacity);
        let extra_guest_rate = if extra_guests > 0 {
            self.config.extra_guest_rate?
        } else {
            self.config.extra_guest_rate.unwrap_or(0)
        };

        let per_night =
            u64::from(nightly_rate) + u64::from(extra_guests) * u64::from(extra_guest_rate);
        let total = per_night * u64::from(nights);
        tracing::debug!(nights, group, weekend, total, "Computed price quote");

        Some(PriceQuote {
            nights,
            group_size: group,
            weekend,
            nightly_rate,
            extra_guests,
            extra_guest_rate,
            total,
            currency: self.config.currency.clone(),
        })
    }
}
