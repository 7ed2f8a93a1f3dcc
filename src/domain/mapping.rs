// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # TM1 → TM2 Mapping
//!
//! This module is the "Translator". TM1 and TM2 describe territories with
//! different objects, so every TM1 row is mapped to its TM2 counterpart:
//!
//! | TM1                                   | TM2                                  |
//! |---------------------------------------|--------------------------------------|
//! | `Territory` tree                      | `Territory2` under one imported model |
//! | `UserTerritory`                       | `UserTerritory2Association` rows     |
//! | `AccountTerritoryAssignmentRule[Item]`| `Territory2Rule` + rule association  |
//! | sharing rules on territory groups     | same rules on Territory2 groups      |
//! | `AccountShare` (`TerritoryManual`)    | not replayed, counted only           |
//!
//! Everything here is pure: the same snapshot always yields the same plan,
//! and nothing that cannot be translated aborts the translation. It lands in
//! `untranslatable` or `dropped_sharing_rules` instead.

use crate::domain::entities::{
    AssignmentRule, AssignmentRuleItem, Territory, Tm1Entity, UserTerritory,
};
use crate::domain::reports::{CountDelta, DroppedSharingRule, UntranslatableItem};
use crate::domain::sharing_rules::{ObjectSharingRules, RuleRewrite};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Name of the synthetic Territory2 model everything is imported into.
pub const IMPORTED_MODEL: &str = "IMPORTED_TERRITORY";
/// Territory2 type assigned to every imported territory.
pub const IMPORTED_TYPE: &str = "Imported";

const MAX_DEVELOPER_NAME: usize = 80;

/// Operators accepted by both TM1 rule items and TM2 rule items.
const SUPPORTED_OPERATIONS: [&str; 12] = [
    "equals",
    "notEqual",
    "lessThan",
    "greaterThan",
    "lessOrEqual",
    "greaterOrEqual",
    "contains",
    "notContain",
    "startsWith",
    "includes",
    "excludes",
    "within",
];

/// Everything Extract pulled out of the source org.
#[derive(Debug, Clone, Default)]
pub struct Tm1Snapshot {
    pub territories: Vec<Territory>,
    pub user_territories: Vec<UserTerritory>,
    pub rules: Vec<AssignmentRule>,
    pub rule_items: Vec<AssignmentRuleItem>,
    pub sharing_rules: Vec<ObjectSharingRules>,
    pub manual_account_shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory2 {
    pub developer_name: String,
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<String>,
    pub account_access_level: Option<String>,
    pub opportunity_access_level: Option<String>,
    pub case_access_level: Option<String>,
    pub contact_access_level: Option<String>,
    /// Rules evaluated for this territory, by rule developer name.
    pub rule_names: Vec<String>,
    pub source_id: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTerritory2Association {
    pub user_id: String,
    pub territory: String,
    pub is_active: bool,
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory2RuleItem {
    pub field: String,
    pub operation: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory2Rule {
    pub developer_name: String,
    pub label: String,
    pub active: bool,
    pub boolean_filter: Option<String>,
    pub object_type: String,
    pub items: Vec<Territory2RuleItem>,
    pub territory: String,
    pub source_id: String,
}

/// The full TM2 translation of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tm2Plan {
    pub model_name: String,
    /// Parents strictly before children; ties broken by TM1 Id.
    pub territories: Vec<Territory2>,
    pub user_associations: Vec<UserTerritory2Association>,
    pub rules: Vec<Territory2Rule>,
    pub sharing_rules: Vec<ObjectSharingRules>,
    pub manual_account_shares: u64,
    pub untranslatable: Vec<UntranslatableItem>,
    pub dropped_sharing_rules: Vec<DroppedSharingRule>,
    pub reconciliation: Vec<CountDelta>,
}

impl Tm2Plan {
    pub fn deployment_order(&self) -> Vec<String> {
        self.territories
            .iter()
            .map(|t| t.developer_name.clone())
            .collect()
    }

    pub fn rule_item_count(&self) -> u64 {
        self.rules.iter().map(|r| r.items.len() as u64).sum()
    }

    pub fn sharing_rule_count(&self) -> u64 {
        self.sharing_rules.iter().map(|o| o.rules.len() as u64).sum()
    }
}

/// Turns an arbitrary label into a valid developer name: ASCII letters,
/// digits and single underscores, starting with a letter, at most 80 chars.
pub fn developer_name(raw: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    let mut name = out.trim_matches('_').to_string();
    if name.is_empty() {
        name = fallback.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name = format!("T_{}", name);
    }
    name.truncate(MAX_DEVELOPER_NAME);
    name.trim_end_matches('_').to_string()
}

/// Hands out developer names, suffixing `_2`, `_3`, ... on collision.
#[derive(Default)]
struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    fn claim(&mut self, base: &str) -> String {
        if self.used.insert(base.to_ascii_lowercase()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let suffix = format!("_{}", n);
            let mut stem = base.to_string();
            stem.truncate(MAX_DEVELOPER_NAME - suffix.len());
            let candidate = format!("{}{}", stem.trim_end_matches('_'), suffix);
            if self.used.insert(candidate.to_ascii_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Translates a TM1 snapshot into a TM2 plan.
pub fn translate(snapshot: &Tm1Snapshot, model_name: &str) -> Tm2Plan {
    let mut untranslatable = Vec::new();

    let (territories, tm1_to_tm2) = translate_hierarchy(&snapshot.territories, &mut untranslatable);
    let user_associations =
        translate_user_territories(&snapshot.user_territories, &tm1_to_tm2, &mut untranslatable);
    let (rules, territories) = translate_rules(
        &snapshot.rules,
        &snapshot.rule_items,
        territories,
        &tm1_to_tm2,
        &mut untranslatable,
    );

    let by_tm1_name = reference_names(&snapshot.territories, &tm1_to_tm2, &mut untranslatable);
    let (sharing_rules, dropped_sharing_rules) =
        translate_sharing_rules(&snapshot.sharing_rules, &by_tm1_name);

    untranslatable.sort();

    let source_sharing: u64 = snapshot
        .sharing_rules
        .iter()
        .map(|o| o.counts().territory_group_references)
        .sum();
    let mut plan = Tm2Plan {
        model_name: model_name.to_string(),
        territories,
        user_associations,
        rules,
        sharing_rules,
        manual_account_shares: snapshot.manual_account_shares,
        untranslatable,
        dropped_sharing_rules,
        reconciliation: vec![],
    };
    plan.reconciliation = vec![
        delta(
            Tm1Entity::Territory.api_name(),
            snapshot.territories.len() as u64,
            "Territory2",
            plan.territories.len() as u64,
        ),
        delta(
            Tm1Entity::UserTerritory.api_name(),
            snapshot.user_territories.len() as u64,
            "UserTerritory2Association",
            plan.user_associations.len() as u64,
        ),
        delta(
            Tm1Entity::AccountTerritoryAssignmentRule.api_name(),
            snapshot.rules.len() as u64,
            "Territory2Rule",
            plan.rules.len() as u64,
        ),
        delta(
            Tm1Entity::AccountTerritoryAssignmentRuleItem.api_name(),
            snapshot.rule_items.len() as u64,
            "Territory2RuleItem",
            plan.rule_item_count(),
        ),
        delta(
            "SharingRule (territory group)",
            source_sharing,
            "SharingRule (Territory2 group)",
            plan.sharing_rule_count(),
        ),
    ];
    plan
}

fn delta(source: &str, source_count: u64, target: &str, target_count: u64) -> CountDelta {
    CountDelta {
        source_entity: source.to_string(),
        source_count,
        target_entity: target.to_string(),
        target_count,
        justification: None,
    }
}

/// The name sharing rules use to point at a TM1 territory.
fn tm1_reference_name(t: &Territory) -> &str {
    t.developer_name
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(&t.name)
}

/// Orders territories parents-first and assigns developer names.
///
/// Kahn's algorithm with a ready set sorted by TM1 Id: a territory becomes
/// ready once its parent was emitted, and the smallest ready Id goes next.
/// Territories whose parent is missing, or that sit on (or below) a cycle,
/// never become ready and are reported as untranslatable.
fn translate_hierarchy(
    source: &[Territory],
    untranslatable: &mut Vec<UntranslatableItem>,
) -> (Vec<Territory2>, BTreeMap<String, String>) {
    let by_id: BTreeMap<&str, &Territory> = source.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut ready: BTreeSet<&str> = BTreeSet::new();
    for t in by_id.values().copied() {
        match parent_of(t) {
            Some(parent) => children.entry(parent).or_default().push(t.id.as_str()),
            None => {
                ready.insert(t.id.as_str());
            }
        }
    }

    let mut order: Vec<&str> = Vec::with_capacity(by_id.len());
    let mut depth: HashMap<&str, usize> = HashMap::new();
    while let Some(id) = ready.pop_first() {
        let d = by_id
            .get(id)
            .and_then(|t| parent_of(t))
            .and_then(|p| depth.get(p))
            .map_or(0, |pd| pd + 1);
        depth.insert(id, d);
        order.push(id);
        if let Some(kids) = children.get(id) {
            ready.extend(kids.iter().copied());
        }
    }

    let emitted: HashSet<&str> = order.iter().copied().collect();
    for t in by_id
        .values()
        .copied()
        .filter(|t| !emitted.contains(t.id.as_str()))
    {
        let parent = parent_of(t).unwrap_or_default();
        let reason = if !by_id.contains_key(parent) {
            format!("parent territory {} not present in extraction", parent)
        } else if on_cycle(t, &by_id) {
            "territory hierarchy contains a cycle".to_string()
        } else {
            format!("parent territory {} could not be translated", parent)
        };
        untranslatable.push(UntranslatableItem {
            kind: Tm1Entity::Territory.api_name().to_string(),
            id: t.id.clone(),
            name: t.name.clone(),
            reason,
        });
    }

    // Names are claimed in TM1 Id order so they do not depend on tree shape.
    let mut registry = NameRegistry::default();
    let mut tm1_to_tm2: BTreeMap<String, String> = BTreeMap::new();
    for t in by_id
        .values()
        .copied()
        .filter(|t| emitted.contains(t.id.as_str()))
    {
        let name = registry.claim(&developer_name(tm1_reference_name(t), "Territory"));
        tm1_to_tm2.insert(t.id.clone(), name);
    }

    let territories = order
        .iter()
        .filter_map(|id| by_id.get(id).copied())
        .map(|t| Territory2 {
            developer_name: tm1_to_tm2[&t.id].clone(),
            name: t.name.clone(),
            description: t.description.clone().filter(|d| !d.is_empty()),
            parent: parent_of(t).map(|p| tm1_to_tm2[p].clone()),
            account_access_level: t.account_access_level.clone(),
            opportunity_access_level: t.opportunity_access_level.clone(),
            case_access_level: t.case_access_level.clone(),
            contact_access_level: t.contact_access_level.clone(),
            rule_names: vec![],
            source_id: t.id.clone(),
            depth: depth[t.id.as_str()],
        })
        .collect();

    (territories, tm1_to_tm2)
}

fn parent_of(t: &Territory) -> Option<&str> {
    t.parent_territory_id.as_deref().filter(|p| !p.is_empty())
}

fn on_cycle(start: &Territory, by_id: &BTreeMap<&str, &Territory>) -> bool {
    let mut current = start;
    for _ in 0..by_id.len() {
        let Some(parent) = current.parent_territory_id.as_deref() else {
            return false;
        };
        if parent == start.id {
            return true;
        }
        match by_id.get(parent) {
            Some(next) => current = *next,
            None => return false,
        }
    }
    false
}

fn translate_user_territories(
    source: &[UserTerritory],
    tm1_to_tm2: &BTreeMap<String, String>,
    untranslatable: &mut Vec<UntranslatableItem>,
) -> Vec<UserTerritory2Association> {
    let mut sorted: Vec<&UserTerritory> = source.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = Vec::with_capacity(sorted.len());
    for ut in sorted {
        match tm1_to_tm2.get(&ut.territory_id) {
            Some(territory) => out.push(UserTerritory2Association {
                user_id: ut.user_id.clone(),
                territory: territory.clone(),
                is_active: ut.is_active,
                source_id: ut.id.clone(),
            }),
            None => untranslatable.push(UntranslatableItem {
                kind: Tm1Entity::UserTerritory.api_name().to_string(),
                id: ut.id.clone(),
                name: ut.user_id.clone(),
                reason: format!(
                    "territory {} has no Territory2 counterpart",
                    ut.territory_id
                ),
            }),
        }
    }
    out
}

fn translate_rules(
    rules: &[AssignmentRule],
    items: &[AssignmentRuleItem],
    mut territories: Vec<Territory2>,
    tm1_to_tm2: &BTreeMap<String, String>,
    untranslatable: &mut Vec<UntranslatableItem>,
) -> (Vec<Territory2Rule>, Vec<Territory2>) {
    let rule_ids: HashSet<&str> = rules.iter().map(|r| r.id.as_str()).collect();

    let mut items_by_rule: BTreeMap<&str, Vec<&AssignmentRuleItem>> = BTreeMap::new();
    for item in items {
        if rule_ids.contains(item.rule_id.as_str()) {
            items_by_rule.entry(item.rule_id.as_str()).or_default().push(item);
        } else {
            untranslatable.push(UntranslatableItem {
                kind: Tm1Entity::AccountTerritoryAssignmentRuleItem
                    .api_name()
                    .to_string(),
                id: item.id.clone(),
                name: item.field.clone(),
                reason: format!("rule {} not present in extraction", item.rule_id),
            });
        }
    }
    for list in items_by_rule.values_mut() {
        list.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
    }

    let mut sorted: Vec<&AssignmentRule> = rules.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut registry = NameRegistry::default();
    let mut out = Vec::new();
    for rule in sorted {
        let rule_items = items_by_rule.get(rule.id.as_str()).cloned().unwrap_or_default();
        let reject = |reason: String| UntranslatableItem {
            kind: Tm1Entity::AccountTerritoryAssignmentRule.api_name().to_string(),
            id: rule.id.clone(),
            name: rule.name.clone(),
            reason,
        };

        let Some(territory) = tm1_to_tm2.get(&rule.territory_id) else {
            untranslatable.push(reject(format!(
                "territory {} has no Territory2 counterpart; {} rule item(s) excluded",
                rule.territory_id,
                rule_items.len()
            )));
            continue;
        };
        if let Some(bad) = rule_items
            .iter()
            .find(|i| !SUPPORTED_OPERATIONS.contains(&i.operation.as_str()))
        {
            untranslatable.push(reject(format!(
                "unsupported operation '{}' on field {}",
                bad.operation, bad.field
            )));
            continue;
        }

        let rule_name = registry.claim(&developer_name(&rule.name, "Rule"));
        if let Some(t) = territories.iter_mut().find(|t| &t.developer_name == territory) {
            t.rule_names.push(rule_name.clone());
        }
        out.push(Territory2Rule {
            developer_name: rule_name,
            label: rule.name.clone(),
            active: rule.is_active,
            boolean_filter: rule.boolean_filter.clone().filter(|f| !f.is_empty()),
            object_type: "Account".to_string(),
            items: rule_items
                .iter()
                .map(|i| Territory2RuleItem {
                    field: qualify_field(&i.field),
                    operation: i.operation.clone(),
                    value: i.value.clone(),
                })
                .collect(),
            territory: territory.clone(),
            source_id: rule.id.clone(),
        });
    }

    for t in territories.iter_mut() {
        t.rule_names.sort();
    }
    (out, territories)
}

/// TM2 rule items name fields as `Account.<Field>`.
fn qualify_field(field: &str) -> String {
    if field.contains('.') {
        field.to_string()
    } else {
        format!("Account.{}", field)
    }
}

/// Sharing rules reference territories by TM1 developer name. A name shared
/// by several translated territories cannot be resolved; it is left out of
/// the map and reported once, so rules naming it are dropped.
fn reference_names(
    territories: &[Territory],
    tm1_to_tm2: &BTreeMap<String, String>,
    untranslatable: &mut Vec<UntranslatableItem>,
) -> HashMap<String, String> {
    let mut candidates: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for t in territories {
        if let Some(tm2) = tm1_to_tm2.get(&t.id) {
            candidates
                .entry(tm1_reference_name(t))
                .or_default()
                .push((t.id.as_str(), tm2.as_str()));
        }
    }

    let mut by_name = HashMap::new();
    for (name, mut matches) in candidates {
        if let [(_, tm2)] = matches.as_slice() {
            by_name.insert(name.to_string(), tm2.to_string());
            continue;
        }
        matches.sort();
        let ids: Vec<&str> = matches.iter().map(|(id, _)| *id).collect();
        untranslatable.push(UntranslatableItem {
            kind: "TerritoryReference".to_string(),
            id: ids.join(","),
            name: name.to_string(),
            reason: format!(
                "name is shared by {} territories; sharing rules naming it cannot be resolved",
                ids.len()
            ),
        });
    }
    by_name
}

fn translate_sharing_rules(
    source: &[ObjectSharingRules],
    by_tm1_name: &HashMap<String, String>,
) -> (Vec<ObjectSharingRules>, Vec<DroppedSharingRule>) {
    let mut objects: Vec<&ObjectSharingRules> = source.iter().collect();
    objects.sort_by(|a, b| a.object.cmp(&b.object));

    let mut translated = Vec::new();
    let mut dropped = Vec::new();
    for object in objects {
        let mut rules = Vec::new();
        for rule in &object.rules {
            match rule.rewrite_territories(|name| by_tm1_name.get(name).cloned()) {
                RuleRewrite::Unaffected => {}
                RuleRewrite::Rewritten(r) => rules.push(r),
                RuleRewrite::Unmapped(names) => dropped.push(DroppedSharingRule {
                    object: object.object.clone(),
                    rule_name: rule.full_name().to_string(),
                    kind: rule.kind.label().to_string(),
                    reason: format!(
                        "references unmapped territory group(s): {}",
                        names.join(", ")
                    ),
                }),
            }
        }
        if !rules.is_empty() {
            translated.push(ObjectSharingRules {
                object: object.object.clone(),
                rules,
            });
        }
    }
    (translated, dropped)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::sharing_rules::tests::ACCOUNT_RULES;

    pub(crate) fn territory(id: &str, name: &str, parent: Option<&str>) -> Territory {
        Territory {
            id: id.into(),
            name: name.into(),
            developer_name: Some(name.replace(' ', "_")),
            parent_territory_id: parent.map(String::from),
            description: None,
            account_access_level: Some("Edit".into()),
            opportunity_access_level: Some("Read".into()),
            case_access_level: Some("None".into()),
            contact_access_level: Some("Read".into()),
        }
    }

    pub(crate) fn user_territory(id: &str, user: &str, territory: &str) -> UserTerritory {
        UserTerritory {
            id: id.into(),
            user_id: user.into(),
            territory_id: territory.into(),
            is_active: true,
        }
    }

    pub(crate) fn rule(id: &str, name: &str, territory: &str) -> AssignmentRule {
        AssignmentRule {
            id: id.into(),
            name: name.into(),
            territory_id: territory.into(),
            is_active: true,
            boolean_filter: None,
        }
    }

    pub(crate) fn item(id: &str, rule: &str, order: u32) -> AssignmentRuleItem {
        AssignmentRuleItem {
            id: id.into(),
            rule_id: rule.into(),
            sort_order: order,
            field: "BillingState".into(),
            operation: "equals".into(),
            value: Some("CA".into()),
        }
    }

    /// Ten territories: two roots, children listed before their parents.
    pub(crate) fn ten_territories() -> Vec<Territory> {
        vec![
            territory("T10", "Bay Area", Some("T04")),
            territory("T09", "SoCal", Some("T04")),
            territory("T08", "Boston", Some("T05")),
            territory("T07", "NYC", Some("T05")),
            territory("T06", "Texas", Some("T02")),
            territory("T05", "Northeast", Some("T03")),
            territory("T04", "California", Some("T02")),
            territory("T03", "East", None),
            territory("T02", "West", None),
            territory("T01", "HQ", None),
        ]
    }

    fn assert_parents_first(plan: &Tm2Plan) {
        let position: HashMap<&str, usize> = plan
            .territories
            .iter()
            .enumerate()
            .map(|(i, t)| (t.developer_name.as_str(), i))
            .collect();
        for (i, t) in plan.territories.iter().enumerate() {
            if let Some(parent) = &t.parent {
                assert!(position[parent.as_str()] < i, "{} before {}", parent, t.developer_name);
            }
        }
    }

    #[test]
    fn test_developer_name() {
        assert_eq!(developer_name("West Coast (US)", "T"), "West_Coast_US");
        assert_eq!(developer_name("2024 Plan", "T"), "T_2024_Plan");
        assert_eq!(developer_name("__", "Territory"), "Territory");
        assert_eq!(developer_name(&"x".repeat(100), "T").len(), 80);
    }

    #[test]
    fn test_name_collisions_get_suffixes() {
        let mut registry = NameRegistry::default();
        assert_eq!(registry.claim("West"), "West");
        assert_eq!(registry.claim("west"), "west_2");
        assert_eq!(registry.claim("West"), "West_3");
    }

    #[test]
    fn test_hierarchy_is_parent_first_and_stable_by_id() {
        let snapshot = Tm1Snapshot {
            territories: ten_territories(),
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert_eq!(plan.territories.len(), 10);
        assert_parents_first(&plan);
        let ids: Vec<&str> = plan.territories.iter().map(|t| t.source_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["T01", "T02", "T03", "T04", "T05", "T06", "T07", "T08", "T09", "T10"]
        );
        let bay = plan.territories.iter().find(|t| t.source_id == "T10").unwrap();
        assert_eq!(bay.parent.as_deref(), Some("California"));
        assert_eq!(bay.depth, 2);
    }

    #[test]
    fn test_deep_chain_with_descending_ids() {
        // Each child has a smaller Id than its parent.
        let territories: Vec<Territory> = (0..20)
            .map(|i| {
                let parent = if i == 19 { None } else { Some(format!("T{:02}", i + 1)) };
                territory(&format!("T{:02}", i), &format!("Level {}", i), parent.as_deref())
            })
            .collect();
        let plan = translate(
            &Tm1Snapshot {
                territories,
                ..Default::default()
            },
            IMPORTED_MODEL,
        );
        assert_eq!(plan.territories.len(), 20);
        assert_parents_first(&plan);
        assert_eq!(plan.territories[0].source_id, "T19");
        assert_eq!(plan.territories[19].depth, 19);
    }

    #[test]
    fn test_missing_parent_and_cycles_are_untranslatable() {
        let snapshot = Tm1Snapshot {
            territories: vec![
                territory("T1", "Root", None),
                territory("T2", "Orphan", Some("T99")),
                territory("T3", "Orphan Child", Some("T2")),
                territory("T4", "Loop A", Some("T5")),
                territory("T5", "Loop B", Some("T4")),
            ],
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert_eq!(plan.deployment_order(), vec!["Root"]);
        let reasons: Vec<(&str, &str)> = plan
            .untranslatable
            .iter()
            .map(|u| (u.id.as_str(), u.reason.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("T2", "parent territory T99 not present in extraction"),
                ("T3", "parent territory T2 could not be translated"),
                ("T4", "territory hierarchy contains a cycle"),
                ("T5", "territory hierarchy contains a cycle"),
            ]
        );
    }

    #[test]
    fn test_user_territories_become_associations() {
        let snapshot = Tm1Snapshot {
            territories: ten_territories(),
            user_territories: (0..25)
                .map(|i| user_territory(&format!("UT{:02}", i), &format!("005{:02}", i), "T04"))
                .collect(),
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert_eq!(plan.user_associations.len(), 25);
        assert!(plan.user_associations.iter().all(|a| a.territory == "California"));
        assert!(plan.untranslatable.is_empty());
    }

    #[test]
    fn test_orphaned_rule_is_excluded_and_counted_once() {
        let snapshot = Tm1Snapshot {
            territories: vec![territory("T1", "West", None)],
            rules: vec![rule("R1", "CA Accounts", "T1"), rule("R2", "Ghost Rule", "T404")],
            rule_items: vec![item("I2", "R1", 2), item("I1", "R1", 1), item("I3", "R2", 1)],
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert_eq!(plan.rules.len(), 1);
        assert_eq!(plan.untranslatable.len(), 1);
        assert_eq!(plan.untranslatable[0].id, "R2");
        assert!(plan.untranslatable[0].reason.contains("1 rule item(s) excluded"));

        let rule = &plan.rules[0];
        assert_eq!(rule.developer_name, "CA_Accounts");
        assert_eq!(rule.territory, "West");
        assert_eq!(rule.items.len(), 2);
        assert_eq!(rule.items[0].field, "Account.BillingState");
        assert_eq!(plan.territories[0].rule_names, vec!["CA_Accounts"]);
    }

    #[test]
    fn test_unsupported_operation_rejects_rule() {
        let mut bad = item("I1", "R1", 1);
        bad.operation = "soundsLike".into();
        let snapshot = Tm1Snapshot {
            territories: vec![territory("T1", "West", None)],
            rules: vec![rule("R1", "Odd", "T1")],
            rule_items: vec![bad],
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert!(plan.rules.is_empty());
        assert!(plan.untranslatable[0].reason.contains("soundsLike"));
    }

    #[test]
    fn test_sharing_rules_rewritten_or_dropped() {
        let snapshot = Tm1Snapshot {
            territories: vec![territory("T1", "West", None)],
            sharing_rules: vec![ObjectSharingRules::parse("Account", ACCOUNT_RULES).unwrap()],
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert_eq!(plan.sharing_rule_count(), 1);
        assert_eq!(plan.sharing_rules[0].rules[0].full_name(), "West_Coast");
        assert_eq!(plan.dropped_sharing_rules.len(), 1);
        assert_eq!(plan.dropped_sharing_rules[0].rule_name, "Ghost");
        assert!(plan.dropped_sharing_rules[0].reason.contains("Atlantis"));
    }

    #[test]
    fn test_shared_reference_name_is_untranslatable() {
        let mut twin = territory("T2", "West Two", None);
        twin.developer_name = None;
        twin.name = "West".into();
        let snapshot = Tm1Snapshot {
            territories: vec![territory("T1", "West", None), twin],
            sharing_rules: vec![ObjectSharingRules::parse("Account", ACCOUNT_RULES).unwrap()],
            ..Default::default()
        };
        let plan = translate(&snapshot, IMPORTED_MODEL);
        assert_eq!(plan.territories.len(), 2);
        let collision = plan
            .untranslatable
            .iter()
            .find(|u| u.kind == "TerritoryReference")
            .unwrap();
        assert_eq!(collision.id, "T1,T2");
        assert_eq!(collision.name, "West");
        // West_Coast shares to West, which no longer resolves
        assert_eq!(plan.sharing_rule_count(), 0);
        assert_eq!(plan.dropped_sharing_rules.len(), 2);
    }

    #[test]
    fn test_translation_is_deterministic_and_monotonic() {
        let mut shuffled = ten_territories();
        shuffled.reverse();
        let a = translate(
            &Tm1Snapshot {
                territories: ten_territories(),
                ..Default::default()
            },
            IMPORTED_MODEL,
        );
        let b = translate(
            &Tm1Snapshot {
                territories: shuffled,
                ..Default::default()
            },
            IMPORTED_MODEL,
        );
        assert_eq!(a, b);
        assert!(crate::domain::reconcile::check_monotonic(&a.reconciliation).is_ok());
    }
}
