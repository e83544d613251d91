//! Between-round upgrades bought with stars.
//!
//! Each upgrade carries a list of [`ParamDelta`]s applied to the persistent
//! [`RoundParams`] when bought. Purchases are validated in this order:
//! exists, not yet bought, prerequisites bought, unlock round reached,
//! affordable. The first failed check is returned.

use crate::{
    error::PurchaseError,
    event::SimEvent,
    params::{ParamDelta, RoundParams},
    types::UpgradeId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeCategory {
    Boxes,
    Board,
    Things,
    Guys,
}

fn first_round() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpgradeConfig {
    pub id:            UpgradeId,
    pub name:          String,
    pub category:      UpgradeCategory,
    pub cost:          u32,
    #[serde(default)]
    pub prerequisites: Vec<UpgradeId>,
    #[serde(default = "first_round")]
    pub unlock_round:  u32,
    pub effects:       Vec<ParamDelta>,
    #[serde(default)]
    pub description:   String,
}

#[derive(Debug, Clone)]
pub struct Upgrade {
    pub config: UpgradeConfig,
    purchased:  bool,
}

impl Upgrade {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_purchased(&self) -> bool {
        self.purchased
    }
}

/// Current vs. post-purchase parameters, for display only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParamPreview {
    pub upgrade_id:            UpgradeId,
    pub cost:                  u32,
    pub current:               RoundParams,
    pub projected:             RoundParams,
    pub score_potential_delta: f64,
}

#[derive(Debug, Clone)]
pub struct UpgradeCatalog {
    upgrades: Vec<Upgrade>,
}

impl UpgradeCatalog {
    pub fn new(configs: Vec<UpgradeConfig>) -> Self {
        let mut upgrades: Vec<Upgrade> = configs
            .into_iter()
            .map(|config| Upgrade { config, purchased: false })
            .collect();
        upgrades.sort_by(|a, b| a.config.category.cmp(&b.config.category));
        Self { upgrades }
    }

    pub fn get(&self, id: &str) -> Option<&Upgrade> {
        self.upgrades.iter().find(|u| u.id() == id)
    }

    pub fn all(&self) -> &[Upgrade] {
        &self.upgrades
    }

    pub fn by_category(&self, category: UpgradeCategory) -> Vec<&Upgrade> {
        self.upgrades.iter().filter(|u| u.config.category == category).collect()
    }

    pub fn is_purchased(&self, id: &str) -> bool {
        self.get(id).is_some_and(Upgrade::is_purchased)
    }

    pub fn purchased_ids(&self) -> Vec<UpgradeId> {
        self.upgrades
            .iter()
            .filter(|u| u.purchased)
            .map(|u| u.config.id.clone())
            .collect()
    }

    /// Run every purchase check without changing anything.
    pub fn check(&self, id: &str, round: u32, stars: u32) -> Result<&Upgrade, PurchaseError> {
        let Some(upgrade) = self.get(id) else {
            log::warn!("upgrade: unknown id '{id}'");
            return Err(PurchaseError::UnknownUpgrade(id.to_string()));
        };
        if upgrade.purchased {
            return Err(PurchaseError::AlreadyPurchased(id.to_string()));
        }
        if let Some(missing) = upgrade.config.prerequisites.iter().find(|p| !self.is_purchased(p)) {
            return Err(PurchaseError::MissingPrerequisite {
                id: id.to_string(),
                missing: missing.clone(),
            });
        }
        if round < upgrade.config.unlock_round {
            return Err(PurchaseError::Locked {
                id: id.to_string(),
                unlock_round: upgrade.config.unlock_round,
            });
        }
        if upgrade.config.cost > stars {
            return Err(PurchaseError::InsufficientStars {
                id: id.to_string(),
                cost: upgrade.config.cost,
                available: stars,
            });
        }
        Ok(upgrade)
    }

    /// Buy `id`: deduct its cost from `stars`, mark it purchased and apply
    /// its deltas to `params`.
    pub fn purchase(
        &mut self,
        id: &str,
        round: u32,
        stars: &mut u32,
        params: &mut RoundParams,
        out: &mut Vec<SimEvent>,
    ) -> Result<(), PurchaseError> {
        let cost = self.check(id, round, *stars)?.config.cost;
        let Some(upgrade) = self.upgrades.iter_mut().find(|u| u.config.id == id) else {
            return Err(PurchaseError::UnknownUpgrade(id.to_string()));
        };
        upgrade.purchased = true;
        *stars -= cost;
        for delta in &upgrade.config.effects {
            delta.apply(params);
        }
        log::info!("upgrade: bought '{id}' for {cost} stars, {} left", *stars);
        out.push(SimEvent::UpgradePurchased {
            upgrade_id: id.to_string(),
            params: params.clone(),
        });
        out.push(SimEvent::StarsSpent {
            amount: cost,
            remaining: *stars,
            upgrade_id: id.to_string(),
        });
        Ok(())
    }

    /// What buying `id` would do to `params`. `None` for unknown ids.
    pub fn preview(&self, id: &str, params: &RoundParams, avg_base_score: f64) -> Option<ParamPreview> {
        let upgrade = self.get(id)?;
        let projected = params.with_deltas(&upgrade.config.effects);
        let score_potential_delta =
            projected.score_potential(avg_base_score) - params.score_potential(avg_base_score);
        Some(ParamPreview {
            upgrade_id: upgrade.config.id.clone(),
            cost: upgrade.config.cost,
            current: params.clone(),
            projected,
            score_potential_delta,
        })
    }

    /// Upgrades that would pass every purchase check right now.
    pub fn available(&self, round: u32, stars: u32) -> Vec<&Upgrade> {
        self.upgrades
            .iter()
            .filter(|u| self.check(u.id(), round, stars).is_ok())
            .collect()
    }

    /// Mark ids as purchased without applying effects; the params they
    /// produced are restored separately. Unknown ids are skipped.
    pub fn restore_purchased(&mut self, ids: &[UpgradeId]) {
        for u in &mut self.upgrades {
            u.purchased = ids.contains(&u.config.id);
        }
        for id in ids.iter().filter(|id| self.get(id).is_none()) {
            log::warn!("upgrade: snapshot lists unknown id '{id}'");
        }
    }
}

pub fn default_upgrades() -> Vec<UpgradeConfig> {
    let u = |id: &str,
             name: &str,
             category: UpgradeCategory,
             cost: u32,
             prerequisites: &[&str],
             unlock_round: u32,
             effects: Vec<ParamDelta>,
             description: &str| UpgradeConfig {
        id: id.into(),
        name: name.into(),
        category,
        cost,
        prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
        unlock_round,
        effects,
        description: description.into(),
    };
    use ParamDelta::*;
    use UpgradeCategory::*;
    vec![
        u("extra_box", "Extra Box", Boxes, 1, &[], 1,
          vec![AddBoxCount(1)], "One more box to fill."),
        u("deep_boxes", "Deep Boxes", Boxes, 2, &["extra_box"], 2,
          vec![AddThingsPerBox(1)], "Every box starts with one more thing."),
        u("box_row", "Box Row", Boxes, 3, &["extra_box"], 3,
          vec![AddBoxCount(2)], "Two more boxes."),
        u("wide_floor", "Wide Floor", Board, 1, &[], 1,
          vec![ExpandBoard { width: 2, height: 2 }], "More room to spread the mess."),
        u("long_shift", "Long Shift", Board, 1, &[], 2,
          vec![AddRoundDuration(30.0)], "Rounds last thirty seconds longer."),
        u("warehouse", "Warehouse", Board, 3, &["wide_floor"], 4,
          vec![ExpandBoard { width: 4, height: 2 }, AddBoxCount(1)], "A much bigger floor and a box to match."),
        u("new_thing", "New Thing", Things, 1, &[], 2,
          vec![AddThingTypeCount(1)], "Another kind of thing to sort."),
        u("thing_variety", "Thing Variety", Things, 2, &["new_thing"], 4,
          vec![AddThingTypeCount(1), AddThingsPerBox(1)], "Yet another kind, and more of everything."),
        u("calm_guys", "Calm Guys", Guys, 2, &[], 1,
          vec![ScaleSpawnInterval(1.15)], "Guys show up a little less often."),
        u("new_guy", "New Guy", Guys, 1, &[], 2,
          vec![AddGuyTypeCount(1)], "Another kind of guy joins in."),
        u("rowdy_crowd", "Rowdy Crowd", Guys, 1, &["new_guy"], 4,
          vec![AddGuyTypeCount(1), ScaleSpawnInterval(0.9)], "Every kind of guy, arriving faster."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> UpgradeCatalog {
        UpgradeCatalog::new(default_upgrades())
    }

    #[test]
    fn purchase_applies_deltas_and_deducts_cost() {
        let mut cat = catalog();
        let mut stars = 3;
        let mut params = RoundParams::default();
        let mut out = Vec::new();
        cat.purchase("extra_box", 1, &mut stars, &mut params, &mut out).unwrap();
        assert_eq!(stars, 2);
        assert_eq!(params.box_count, RoundParams::default().box_count + 1);
        assert!(cat.is_purchased("extra_box"));
        assert!(matches!(out.last(), Some(SimEvent::StarsSpent { amount: 1, remaining: 2, .. })));

        let again = cat.purchase("extra_box", 1, &mut stars, &mut params, &mut out);
        assert_eq!(again, Err(PurchaseError::AlreadyPurchased("extra_box".into())));
        assert_eq!(stars, 2);
    }

    #[test]
    fn purchase_checks_prerequisites_then_round_then_stars() {
        let mut cat = catalog();
        let mut params = RoundParams::default();
        let mut out = Vec::new();

        let mut stars = 10;
        assert!(matches!(
            cat.purchase("deep_boxes", 5, &mut stars, &mut params, &mut out),
            Err(PurchaseError::MissingPrerequisite { .. })
        ));
        assert!(matches!(
            cat.purchase("new_thing", 1, &mut stars, &mut params, &mut out),
            Err(PurchaseError::Locked { unlock_round: 2, .. })
        ));
        let mut poor = 1;
        assert!(matches!(
            cat.purchase("calm_guys", 1, &mut poor, &mut params, &mut out),
            Err(PurchaseError::InsufficientStars { cost: 2, available: 1, .. })
        ));
        assert_eq!(params, RoundParams::default());
        assert!(out.is_empty());
        assert_eq!(cat.purchased_ids(), Vec::<UpgradeId>::new());
    }

    #[test]
    fn unknown_upgrade_is_rejected() {
        let cat = catalog();
        assert_eq!(cat.check("laser", 9, 9).err(), Some(PurchaseError::UnknownUpgrade("laser".into())));
        assert!(cat.preview("laser", &RoundParams::default(), 10.0).is_none());
    }

    #[test]
    fn preview_does_not_mutate() {
        let cat = catalog();
        let params = RoundParams::default();
        let p = cat.preview("wide_floor", &params, 12.0).unwrap();
        assert_eq!(p.current, params);
        assert_eq!(p.projected.board_size.width, params.board_size.width + 2);
        assert!(p.score_potential_delta > 0.0);
        assert!(!cat.is_purchased("wide_floor"));
    }

    #[test]
    fn available_filters_by_round_and_stars() {
        let cat = catalog();
        let ids: Vec<&str> = cat.available(1, 1).iter().map(|u| u.id()).collect();
        assert!(ids.contains(&"extra_box"));
        assert!(ids.contains(&"wide_floor"));
        assert!(!ids.contains(&"calm_guys"), "costs 2");
        assert!(!ids.contains(&"new_thing"), "unlocks at round 2");
        assert!(cat.available(1, 0).is_empty());
    }

    #[test]
    fn catalog_is_grouped_by_category() {
        let cat = catalog();
        let cats: Vec<UpgradeCategory> = cat.all().iter().map(|u| u.config.category).collect();
        let mut sorted = cats.clone();
        sorted.sort();
        assert_eq!(cats, sorted);
        assert_eq!(cat.by_category(UpgradeCategory::Guys).len(), 3);
    }
}
