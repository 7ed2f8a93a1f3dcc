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

//! Count reconciliation between stages.
//!
//! A discrepancy never aborts a stage. It is written verbatim into the
//! stage's report so an operator can decide whether it matters (records
//! edited in the org during extraction are the usual cause).

use crate::domain::entities::{Discrepancy, Tm1Entity, Tm1RecordCounts};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::reports::{CountDelta, Tm1MetadataCounts};

/// Compares expected (Analyze) against actual (Extract) counts per entity.
pub fn reconcile(expected: &Tm1RecordCounts, actual: &Tm1RecordCounts) -> Vec<Discrepancy> {
    Tm1Entity::ALL
        .iter()
        .filter(|e| expected.get(**e) != actual.get(**e))
        .map(|e| Discrepancy {
            entity: e.api_name().to_string(),
            expected: expected.get(*e),
            actual: actual.get(*e),
        })
        .collect()
}

/// Compares sharing-rule totals per object. Objects skipped on either side
/// are not compared; the skip itself is already recorded in the report.
pub fn reconcile_metadata(
    expected: &Tm1MetadataCounts,
    actual: &Tm1MetadataCounts,
) -> Vec<Discrepancy> {
    expected
        .objects
        .iter()
        .filter_map(|exp| {
            let act = actual.for_object(&exp.object)?;
            if act.sharing_rules_count == exp.sharing_rules_count {
                return None;
            }
            Some(Discrepancy {
                entity: format!("{} sharing rules", exp.object),
                expected: exp.sharing_rules_count,
                actual: act.sharing_rules_count,
            })
        })
        .collect()
}

/// Enforces that no translation increases a count without a logged reason.
pub fn check_monotonic(deltas: &[CountDelta]) -> Result<()> {
    for delta in deltas {
        if delta.target_count > delta.source_count && delta.justification.is_none() {
            return Err(MigrationError::Transform(format!(
                "{} count grew from {} to {} ({}) without a transformation rule",
                delta.target_entity, delta.source_count, delta.target_count, delta.source_entity
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reports::ObjectSharingRuleCounts;

    #[test]
    fn test_identical_counts_have_no_discrepancies() {
        let counts = Tm1RecordCounts {
            territory: 10,
            user_territory: 25,
            ..Default::default()
        };
        assert!(reconcile(&counts, &counts.clone()).is_empty());
    }

    #[test]
    fn test_mismatch_reported_in_entity_order() {
        let expected = Tm1RecordCounts {
            territory: 10,
            user_territory: 25,
            group: 20,
            ..Default::default()
        };
        let actual = Tm1RecordCounts {
            territory: 9,
            user_territory: 26,
            group: 20,
            ..Default::default()
        };
        let d = reconcile(&expected, &actual);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].entity, "Territory");
        assert_eq!((d[0].expected, d[0].actual), (10, 9));
        assert_eq!(d[1].entity, "UserTerritory");
        assert_eq!((d[1].expected, d[1].actual), (25, 26));
    }

    #[test]
    fn test_metadata_skips_objects_missing_on_one_side() {
        let obj = |name: &str, n: u64| ObjectSharingRuleCounts {
            object: name.into(),
            sharing_rules_count: n,
            ..Default::default()
        };
        let expected = Tm1MetadataCounts {
            objects: vec![obj("Account", 3), obj("Lead", 1)],
            skipped: vec![],
        };
        let actual = Tm1MetadataCounts {
            objects: vec![obj("Account", 2)],
            skipped: vec![],
        };
        let d = reconcile_metadata(&expected, &actual);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].entity, "Account sharing rules");
    }

    #[test]
    fn test_unjustified_increase_is_rejected() {
        let mut delta = CountDelta {
            source_entity: "AccountTerritoryAssignmentRule".into(),
            source_count: 1,
            target_entity: "Territory2Rule".into(),
            target_count: 2,
            justification: None,
        };
        assert!(check_monotonic(&[delta.clone()]).is_err());
        delta.justification = Some("rule split per object".into());
        assert!(check_monotonic(&[delta]).is_ok());
    }
}
