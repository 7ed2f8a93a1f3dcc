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

//! Infrastructure adapter that renders Territory2 metadata packages.
//!
//! Output follows the Metadata API source layout:
//!
//! ```text
//! package.xml
//! territory2Types/Imported.territory2Type
//! territory2Models/<Model>/<Model>.territory2Model
//! territory2Models/<Model>/territories/<Territory>.territory2
//! territory2Models/<Model>/rules/<Rule>.territory2Rule
//! ```
//!
//! Rendering is deterministic: the same plan always produces the same bytes.

use crate::domain::entities::MetadataFile;
use crate::domain::errors::Result;
use crate::domain::mapping::{Territory2, Territory2Rule, Tm2Plan, IMPORTED_TYPE};
use crate::domain::sharing_rules::{
    sharing_rules_path, ObjectSharingRules, SharingRuleKind, XmlElement, METADATA_NAMESPACE,
};
use crate::ports::artifact_port::ArtifactPort;
use std::collections::BTreeMap;

/// Concrete implementation of `ArtifactPort` producing Metadata API XML.
pub struct MetadataXmlAdapter {
    api_version: String,
}

impl MetadataXmlAdapter {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
        }
    }

    fn package_xml(&self, members: &BTreeMap<&'static str, Vec<String>>) -> MetadataFile {
        let mut types: Vec<XmlElement> = Vec::new();
        for (type_name, names) in members {
            let mut names = names.clone();
            names.sort();
            let mut children: Vec<XmlElement> = names
                .into_iter()
                .map(|n| XmlElement::leaf("members", n))
                .collect();
            children.push(XmlElement::leaf("name", *type_name));
            types.push(XmlElement::parent("types", children));
        }
        types.push(XmlElement::leaf("version", self.api_version.clone()));
        MetadataFile {
            path: "package.xml".to_string(),
            content: document("Package", &types),
        }
    }

    fn model_xml(&self, plan: &Tm2Plan) -> String {
        document(
            "Territory2Model",
            &[
                XmlElement::leaf(
                    "description",
                    "Imported from Territory Management 1.0",
                ),
                XmlElement::leaf("name", plan.model_name.clone()),
            ],
        )
    }

    fn type_xml(&self) -> String {
        document(
            "Territory2Type",
            &[
                XmlElement::leaf(
                    "description",
                    "Territories imported from Territory Management 1.0",
                ),
                XmlElement::leaf("name", IMPORTED_TYPE),
                XmlElement::leaf("priority", "1"),
            ],
        )
    }

    fn territory_xml(&self, t: &Territory2) -> String {
        let mut children = Vec::new();
        let mut optional = |name: &str, value: &Option<String>| {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                children.push(XmlElement::leaf(name, v));
            }
        };
        optional("accountAccessLevel", &t.account_access_level);
        optional("caseAccessLevel", &t.case_access_level);
        optional("contactAccessLevel", &t.contact_access_level);
        optional("description", &t.description);
        children.push(XmlElement::leaf("name", t.name.clone()));
        if let Some(v) = t.opportunity_access_level.as_deref().filter(|v| !v.is_empty()) {
            children.push(XmlElement::leaf("opportunityAccessLevel", v));
        }
        if let Some(parent) = &t.parent {
            children.push(XmlElement::leaf("parentTerritory", parent.clone()));
        }
        for rule in &t.rule_names {
            children.push(XmlElement::parent(
                "ruleAssociations",
                vec![
                    XmlElement::leaf("inherited", "false"),
                    XmlElement::leaf("ruleName", rule.clone()),
                ],
            ));
        }
        children.push(XmlElement::leaf("territory2Type", IMPORTED_TYPE));
        document("Territory2", &children)
    }

    fn rule_xml(&self, rule: &Territory2Rule) -> String {
        let mut children = vec![XmlElement::leaf("active", rule.active.to_string())];
        if let Some(filter) = &rule.boolean_filter {
            children.push(XmlElement::leaf("booleanFilter", filter.clone()));
        }
        children.push(XmlElement::leaf("name", rule.label.clone()));
        children.push(XmlElement::leaf("objectType", rule.object_type.clone()));
        for item in &rule.items {
            let mut fields = vec![
                XmlElement::leaf("field", item.field.clone()),
                XmlElement::leaf("operation", item.operation.clone()),
            ];
            if let Some(value) = &item.value {
                fields.push(XmlElement::leaf("value", value.clone()));
            }
            children.push(XmlElement::parent("ruleItems", fields));
        }
        document("Territory2Rule", &children)
    }
}

impl ArtifactPort for MetadataXmlAdapter {
    fn territory_package(&self, plan: &Tm2Plan) -> Result<Vec<MetadataFile>> {
        let model = &plan.model_name;
        let model_dir = format!("territory2Models/{}", model);
        let mut members: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        let mut files = Vec::new();

        members.insert("Territory2Model", vec![model.clone()]);
        files.push(MetadataFile {
            path: format!("{}/{}.territory2Model", model_dir, model),
            content: self.model_xml(plan),
        });

        members.insert("Territory2Type", vec![IMPORTED_TYPE.to_string()]);
        files.push(MetadataFile {
            path: format!("territory2Types/{}.territory2Type", IMPORTED_TYPE),
            content: self.type_xml(),
        });

        // Parents first, so the files list doubles as the deployment order.
        for t in &plan.territories {
            members
                .entry("Territory2")
                .or_default()
                .push(format!("{}.{}", model, t.developer_name));
            files.push(MetadataFile {
                path: format!("{}/territories/{}.territory2", model_dir, t.developer_name),
                content: self.territory_xml(t),
            });
        }
        for rule in &plan.rules {
            members
                .entry("Territory2Rule")
                .or_default()
                .push(format!("{}.{}", model, rule.developer_name));
            files.push(MetadataFile {
                path: format!("{}/rules/{}.territory2Rule", model_dir, rule.developer_name),
                content: self.rule_xml(rule),
            });
        }

        files.insert(0, self.package_xml(&members));
        Ok(files)
    }

    fn sharing_rules_package(&self, rules: &[ObjectSharingRules]) -> Result<Vec<MetadataFile>> {
        let mut members: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        let mut files = Vec::new();
        for object in rules.iter().filter(|o| !o.rules.is_empty()) {
            for rule in &object.rules {
                let type_name = match rule.kind {
                    SharingRuleKind::Criteria => "SharingCriteriaRule",
                    SharingRuleKind::Owner => "SharingOwnerRule",
                    SharingRuleKind::Territory => "SharingTerritoryRule",
                };
                members
                    .entry(type_name)
                    .or_default()
                    .push(format!("{}.{}", object.object, rule.full_name()));
            }
            files.push(MetadataFile {
                path: sharing_rules_path(&object.object),
                content: object.render(),
            });
        }
        files.insert(0, self.package_xml(&members));
        Ok(files)
    }
}

/// Renders a metadata document with the namespace on its root element.
fn document(root: &str, children: &[XmlElement]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<{} xmlns=\"{}\">\n", root, METADATA_NAMESPACE));
    for child in children {
        child.write_to(&mut out, 1);
    }
    out.push_str(&format!("</{}>\n", root));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::tests::{item, rule, territory};
    use crate::domain::mapping::{translate, Tm1Snapshot, IMPORTED_MODEL};
    use crate::domain::sharing_rules::tests::ACCOUNT_RULES;

    fn plan() -> Tm2Plan {
        translate(
            &Tm1Snapshot {
                territories: vec![
                    territory("T2", "North & West", Some("T1")),
                    territory("T1", "Americas", None),
                ],
                rules: vec![rule("R1", "Big CA", "T2")],
                rule_items: vec![item("I1", "R1", 1)],
                ..Default::default()
            },
            IMPORTED_MODEL,
        )
    }

    fn file<'a>(files: &'a [MetadataFile], path: &str) -> &'a str {
        &files.iter().find(|f| f.path == path).unwrap().content
    }

    #[test]
    fn test_package_layout_and_order() {
        let files = MetadataXmlAdapter::new("60.0").territory_package(&plan()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "package.xml",
                "territory2Models/IMPORTED_TERRITORY/IMPORTED_TERRITORY.territory2Model",
                "territory2Types/Imported.territory2Type",
                "territory2Models/IMPORTED_TERRITORY/territories/Americas.territory2",
                "territory2Models/IMPORTED_TERRITORY/territories/North_West.territory2",
                "territory2Models/IMPORTED_TERRITORY/rules/Big_CA.territory2Rule",
            ]
        );
    }

    #[test]
    fn test_territory_xml() {
        let files = MetadataXmlAdapter::new("60.0").territory_package(&plan()).unwrap();
        let xml = file(
            &files,
            "territory2Models/IMPORTED_TERRITORY/territories/North_West.territory2",
        );
        assert!(xml.contains("<name>North &amp; West</name>"));
        assert!(xml.contains("<parentTerritory>Americas</parentTerritory>"));
        assert!(xml.contains("<ruleName>Big_CA</ruleName>"));
        assert!(xml.contains("<territory2Type>Imported</territory2Type>"));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Territory2 xmlns="));
        roxmltree::Document::parse(xml).unwrap();
    }

    #[test]
    fn test_package_xml_members() {
        let files = MetadataXmlAdapter::new("60.0").territory_package(&plan()).unwrap();
        let xml = file(&files, "package.xml");
        assert!(xml.contains("<members>IMPORTED_TERRITORY.Americas</members>"));
        assert!(xml.contains("<members>IMPORTED_TERRITORY.Big_CA</members>"));
        assert!(xml.contains("<version>60.0</version>"));
        let rule_xml = file(&files, "territory2Models/IMPORTED_TERRITORY/rules/Big_CA.territory2Rule");
        assert!(rule_xml.contains("<field>Account.BillingState</field>"));
    }

    #[test]
    fn test_sharing_rules_package() {
        let rules = ObjectSharingRules::parse("Account", ACCOUNT_RULES).unwrap();
        let files = MetadataXmlAdapter::new("60.0")
            .sharing_rules_package(&[rules])
            .unwrap();
        assert_eq!(files.len(), 2);
        let package = file(&files, "package.xml");
        assert!(package.contains("<members>Account.West_Coast</members>"));
        assert!(package.contains("<name>SharingCriteriaRule</name>"));
        assert!(package.contains("<name>SharingTerritoryRule</name>"));
        assert_eq!(files[1].path, "sharingRules/Account.sharingRules");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let adapter = MetadataXmlAdapter::new("60.0");
        assert_eq!(
            adapter.territory_package(&plan()).unwrap(),
            adapter.territory_package(&plan()).unwrap()
        );
    }
}
