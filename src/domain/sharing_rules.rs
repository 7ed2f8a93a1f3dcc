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

//! # Sharing Rules
//!
//! Sharing rules arrive as `<Object>.sharingRules` metadata XML. We only need
//! to understand a small part of a rule (its name, its kind and who it shares
//! to/from), but everything else in it must survive the round trip. So a rule
//! is kept as a generic element tree and only the `territory` and
//! `territoryAndSubordinates` principals are ever rewritten.

use crate::domain::errors::{MigrationError, Result};
use crate::domain::reports::ObjectSharingRuleCounts;
use std::fmt::Write as _;

pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Principal element names that point at a territory group.
const TERRITORY_PRINCIPALS: [&str; 2] = ["territory", "territoryAndSubordinates"];

/// A metadata XML element with either text or child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            children: vec![],
        }
    }

    pub fn parent(name: impl Into<String>, children: Vec<XmlElement>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children,
        }
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let children: Vec<XmlElement> = node
            .children()
            .filter(|c| c.is_element())
            .map(XmlElement::from_node)
            .collect();
        let text = if children.is_empty() {
            node.text().map(|t| t.to_string())
        } else {
            None
        };
        Self {
            name: node.tag_name().name().to_string(),
            text,
            children,
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.text.as_deref())
    }

    /// Appends this element, indented by `depth` levels of four spaces.
    pub fn write_to(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        if !self.children.is_empty() {
            let _ = writeln!(out, "{}<{}>", indent, self.name);
            for child in &self.children {
                child.write_to(out, depth + 1);
            }
            let _ = writeln!(out, "{}</{}>", indent, self.name);
        } else if let Some(text) = &self.text {
            let _ = writeln!(out, "{}<{}>{}</{}>", indent, self.name, escape_xml(text), self.name);
        } else {
            let _ = writeln!(out, "{}<{}/>", indent, self.name);
        }
    }
}

/// Escapes the five XML special characters.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SharingRuleKind {
    Criteria,
    Owner,
    Territory,
}

impl SharingRuleKind {
    pub const ALL: [SharingRuleKind; 3] = [
        SharingRuleKind::Criteria,
        SharingRuleKind::Owner,
        SharingRuleKind::Territory,
    ];

    pub fn element_name(&self) -> &'static str {
        match self {
            SharingRuleKind::Criteria => "sharingCriteriaRules",
            SharingRuleKind::Owner => "sharingOwnerRules",
            SharingRuleKind::Territory => "sharingTerritoryRules",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SharingRuleKind::Criteria => "criteria",
            SharingRuleKind::Owner => "owner",
            SharingRuleKind::Territory => "territory",
        }
    }

    fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.element_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingRule {
    pub kind: SharingRuleKind,
    pub element: XmlElement,
}

/// Result of pointing a rule at TM2 territories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleRewrite {
    /// The rule never mentions a territory; TM2 does not need it.
    Unaffected,
    /// Every territory reference was mapped.
    Rewritten(SharingRule),
    /// At least one territory had no TM2 counterpart.
    Unmapped(Vec<String>),
}

impl SharingRule {
    pub fn full_name(&self) -> &str {
        self.element.child_text("fullName").unwrap_or("")
    }

    /// Territory developer names this rule shares to or from.
    pub fn territory_references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for side in ["sharedTo", "sharedFrom"] {
            if let Some(principals) = self.element.child(side) {
                for p in &principals.children {
                    if TERRITORY_PRINCIPALS.contains(&p.name.as_str()) {
                        if let Some(name) = &p.text {
                            refs.push(name.clone());
                        }
                    }
                }
            }
        }
        refs
    }

    /// Rewrites territory principals with `map`. The input is never modified.
    pub fn rewrite_territories<F>(&self, map: F) -> RuleRewrite
    where
        F: Fn(&str) -> Option<String>,
    {
        let refs = self.territory_references();
        if refs.is_empty() {
            return RuleRewrite::Unaffected;
        }
        let unmapped: Vec<String> = refs.iter().filter(|r| map(r).is_none()).cloned().collect();
        if !unmapped.is_empty() {
            return RuleRewrite::Unmapped(unmapped);
        }

        let mut element = self.element.clone();
        for side in element
            .children
            .iter_mut()
            .filter(|c| c.name == "sharedTo" || c.name == "sharedFrom")
        {
            for principal in side
                .children
                .iter_mut()
                .filter(|p| TERRITORY_PRINCIPALS.contains(&p.name.as_str()))
            {
                if let Some(mapped) = principal.text.as_deref().and_then(&map) {
                    principal.text = Some(mapped);
                }
            }
        }
        RuleRewrite::Rewritten(SharingRule {
            kind: self.kind,
            element,
        })
    }
}

/// All sharing rules defined on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSharingRules {
    pub object: String,
    pub rules: Vec<SharingRule>,
}

impl ObjectSharingRules {
    /// Parses `<Object>.sharingRules` XML. Rule kinds other than
    /// criteria/owner/territory are ignored.
    pub fn parse(object: &str, xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            MigrationError::Transform(format!("invalid sharing rules XML for {}: {}", object, e))
        })?;
        let root = doc.root_element();
        if root.tag_name().name() != "SharingRules" {
            return Err(MigrationError::Transform(format!(
                "expected <SharingRules> for {}, found <{}>",
                object,
                root.tag_name().name()
            )));
        }
        let rules = root
            .children()
            .filter(|n| n.is_element())
            .filter_map(|n| {
                SharingRuleKind::from_element_name(n.tag_name().name()).map(|kind| SharingRule {
                    kind,
                    element: XmlElement::from_node(n),
                })
            })
            .collect();
        Ok(Self {
            object: object.to_string(),
            rules,
        })
    }

    /// Renders the rules grouped by kind, in the order the Metadata API lists them.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(out, "<SharingRules xmlns=\"{}\">", METADATA_NAMESPACE);
        for kind in SharingRuleKind::ALL {
            for rule in self.rules.iter().filter(|r| r.kind == kind) {
                rule.element.write_to(&mut out, 1);
            }
        }
        out.push_str("</SharingRules>\n");
        out
    }

    pub fn counts(&self) -> ObjectSharingRuleCounts {
        let of_kind = |k: SharingRuleKind| self.rules.iter().filter(|r| r.kind == k).count() as u64;
        ObjectSharingRuleCounts {
            object: self.object.clone(),
            criteria_based: of_kind(SharingRuleKind::Criteria),
            owner_based: of_kind(SharingRuleKind::Owner),
            territory_based: of_kind(SharingRuleKind::Territory),
            territory_group_references: self
                .rules
                .iter()
                .filter(|r| !r.territory_references().is_empty())
                .count() as u64,
            sharing_rules_count: self.rules.len() as u64,
        }
    }
}

/// Path of an object's sharing rules file inside a metadata package.
pub fn sharing_rules_path(object: &str) -> String {
    format!("sharingRules/{}.sharingRules", object)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ACCOUNT_RULES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SharingRules xmlns="http://soap.sforce.com/2006/04/metadata">
    <sharingCriteriaRules>
        <fullName>West_Coast</fullName>
        <accessLevel>Read</accessLevel>
        <label>West &amp; Coast</label>
        <sharedTo>
            <territoryAndSubordinates>West</territoryAndSubordinates>
        </sharedTo>
        <criteriaItems>
            <field>BillingState</field>
            <operation>equals</operation>
            <value>CA</value>
        </criteriaItems>
    </sharingCriteriaRules>
    <sharingOwnerRules>
        <fullName>Execs</fullName>
        <accessLevel>Edit</accessLevel>
        <label>Execs</label>
        <sharedTo>
            <role>CEO</role>
        </sharedTo>
        <sharedFrom>
            <roleAndSubordinates>VP</roleAndSubordinates>
        </sharedFrom>
    </sharingOwnerRules>
    <sharingTerritoryRules>
        <fullName>Ghost</fullName>
        <accessLevel>Read</accessLevel>
        <label>Ghost</label>
        <sharedTo>
            <territory>Atlantis</territory>
        </sharedTo>
        <sharedFrom>
            <territory>West</territory>
        </sharedFrom>
    </sharingTerritoryRules>
</SharingRules>
"#;

    #[test]
    fn test_parse_and_count() {
        let rules = ObjectSharingRules::parse("Account", ACCOUNT_RULES).unwrap();
        let counts = rules.counts();
        assert_eq!(counts.criteria_based, 1);
        assert_eq!(counts.owner_based, 1);
        assert_eq!(counts.territory_based, 1);
        assert_eq!(counts.territory_group_references, 2);
        assert_eq!(counts.sharing_rules_count, 3);
        assert_eq!(rules.rules[0].full_name(), "West_Coast");
        assert_eq!(rules.rules[2].territory_references(), vec!["Atlantis", "West"]);
    }

    #[test]
    fn test_rewrite() {
        let rules = ObjectSharingRules::parse("Account", ACCOUNT_RULES).unwrap();
        let map = |name: &str| (name == "West").then(|| "West_Region".to_string());

        match rules.rules[0].rewrite_territories(map) {
            RuleRewrite::Rewritten(rule) => {
                assert_eq!(rule.territory_references(), vec!["West_Region"]);
                assert_eq!(rule.element.child_text("label"), Some("West & Coast"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rules.rules[1].rewrite_territories(map), RuleRewrite::Unaffected);
        assert_eq!(
            rules.rules[2].rewrite_territories(map),
            RuleRewrite::Unmapped(vec!["Atlantis".to_string()])
        );
        // the source rule is untouched
        assert_eq!(rules.rules[0].territory_references(), vec!["West"]);
    }

    #[test]
    fn test_render_roundtrip_keeps_unknown_elements() {
        let rules = ObjectSharingRules::parse("Account", ACCOUNT_RULES).unwrap();
        let xml = rules.render();
        assert!(xml.contains("<label>West &amp; Coast</label>"));
        assert!(xml.contains("<criteriaItems>"));
        let reparsed = ObjectSharingRules::parse("Account", &xml).unwrap();
        assert_eq!(reparsed, rules);
    }

    #[test]
    fn test_parse_rejects_other_roots() {
        assert!(ObjectSharingRules::parse("Account", "<Territory2/>").is_err());
        assert!(ObjectSharingRules::parse("Account", "<SharingRules>").is_err());
    }
}
