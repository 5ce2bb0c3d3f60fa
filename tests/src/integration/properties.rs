//! # Properties
//!
//! proptest checks over allowance planning, appendix planning, draft
//! persistence and fail-fast sequencing.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use primitive_types::U256;
    use proptest::prelude::*;

    use registration_pipeline::algorithms::plan_approval;
    use registration_pipeline::domain::{AllowancePolicy, DocumentKind, TxPurpose};
    use registration_pipeline::{
        plan_appendices, AppendixKey, AssetDraft, DraftStore, EntityId, FileDraftStore,
        PipelineKind, RegistrationPipelineApi, SkipReason,
    };

    use crate::integration::fixtures::{documented_manifest, manifest_draft, pdf, Sandbox};

    // -------------------------------------------------------------------------
    // Strategies
    // -------------------------------------------------------------------------

    fn arb_policy() -> impl Strategy<Value = AllowancePolicy> {
        prop_oneof![Just(AllowancePolicy::Exact), Just(AllowancePolicy::Unbounded)]
    }

    fn arb_draft() -> impl Strategy<Value = AssetDraft> {
        (
            prop_oneof![Just(PipelineKind::Tokenization), Just(PipelineKind::Manifest)],
            1u32..8,
            proptest::collection::btree_map("[a-zA-Z.]{1,12}", "[ -~]{0,24}", 0..8),
            proptest::collection::btree_set("[a-z]{3,10}", 0..4),
            proptest::option::of(1u64..1_000_000),
        )
            .prop_map(|(kind, step, fields, flags, entity_id)| {
                let mut draft = AssetDraft::new(kind);
                draft.step_index = step;
                for (key, value) in fields {
                    draft.set_field(key, value);
                }
                draft.flags = flags;
                draft.checkpoint.entity_id = entity_id.map(EntityId::from);
                draft
            })
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // ---------------------------------------------------------------------
        // Allowance: approve only when short, and never twice
        // ---------------------------------------------------------------------

        #[test]
        fn approval_only_when_allowance_short(
            allowance in any::<u128>(),
            fee in 1u128..,
            policy in arb_policy(),
        ) {
            let (allowance, fee) = (U256::from(allowance), U256::from(fee));
            match plan_approval(allowance, fee, policy) {
                None => prop_assert!(allowance >= fee),
                Some(amount) => {
                    prop_assert!(allowance < fee);
                    prop_assert!(amount >= fee);
                    // once granted, a second plan approves nothing
                    prop_assert_eq!(plan_approval(amount, fee, policy), None);
                }
            }
        }

        // ---------------------------------------------------------------------
        // Appendix plan: declared and complete is attached, the rest skipped
        // ---------------------------------------------------------------------

        #[test]
        fn plan_attaches_exactly_declared_and_complete(
            declared in proptest::array::uniform3(any::<bool>()),
            complete in proptest::array::uniform3(any::<bool>()),
            documents in proptest::array::uniform3(any::<bool>()),
        ) {
            let mut draft = manifest_draft();
            let flags = [AppendixKey::Hazardous, AppendixKey::Reefer, AppendixKey::Oversized];
            for (i, key) in flags.iter().enumerate() {
                if declared[i] {
                    draft.set_flag(key.governing_flag().unwrap_or_default(), true);
                }
            }
            if complete[0] {
                draft.set_field("hazardous.unClass", "3");
                draft = draft.with_document("msds", pdf("msds.pdf"));
            }
            if complete[1] {
                draft.set_field("reefer.temperature", "-18");
            }
            if complete[2] {
                draft.set_field("oversized.length", "12.5");
                draft.set_field("oversized.width", "2.4");
                draft.set_field("oversized.height", "3.1");
            }
            for (i, kind) in DocumentKind::ALL.iter().enumerate() {
                if documents[i] {
                    draft = draft.with_document(kind.slot(), pdf(kind.slot()));
                }
            }

            let plan = plan_appendices(&draft).expect("well-formed values");
            let planned: BTreeSet<_> = plan.keys().into_iter().collect();

            for (i, key) in flags.iter().enumerate() {
                prop_assert_eq!(planned.contains(key), declared[i] && complete[i]);
                let skipped = plan.skipped.iter().find(|s| s.key == *key);
                match (declared[i], complete[i]) {
                    (false, _) => prop_assert_eq!(
                        skipped.map(|s| &s.reason),
                        Some(&SkipReason::NotDeclared)
                    ),
                    (true, false) => {
                        let incomplete = matches!(
                            skipped.map(|s| &s.reason),
                            Some(SkipReason::Incomplete { .. })
                        );
                        prop_assert!(incomplete, "{} should be incomplete", key);
                    }
                    (true, true) => prop_assert!(skipped.is_none()),
                }
            }
            for (i, kind) in DocumentKind::ALL.iter().enumerate() {
                prop_assert_eq!(planned.contains(&AppendixKey::Document(*kind)), documents[i]);
            }

            let keys = plan.keys();
            let mut sorted = keys.clone();
            sorted.sort();
            prop_assert_eq!(keys, sorted);
        }

        // ---------------------------------------------------------------------
        // Draft store: what is saved is what is loaded
        // ---------------------------------------------------------------------

        #[test]
        fn file_store_round_trips_drafts(draft in arb_draft()) {
            let dir = tempfile::tempdir().expect("tempdir");
            let store = FileDraftStore::new(dir.path());
            store.save(&draft).expect("save");
            prop_assert_eq!(store.load(draft.kind), Some(draft.clone()));

            store.clear(draft.kind).expect("clear");
            prop_assert!(!store.exists(draft.kind));
        }

        // ---------------------------------------------------------------------
        // Sequencing: nothing is submitted after the first failure
        // ---------------------------------------------------------------------

        #[test]
        fn sequencing_stops_at_first_failure(failing in 0usize..3) {
            let failing_key = AppendixKey::Document(DocumentKind::ALL[failing]);
            let sandbox = Sandbox::new();
            sandbox.ledger.fail_attachment(failing_key);

            let result = runtime().block_on(sandbox.pipeline.submit(documented_manifest()));

            prop_assert_eq!(
                result.abort_reason(),
                Some(registration_pipeline::AbortReason::AttachmentFailed(failing_key))
            );
            let id = result.entity_id.expect("registered before appendices");
            prop_assert_eq!(sandbox.ledger.attachments(id).len(), failing);

            let submissions = sandbox.ledger.submissions();
            prop_assert_eq!(submissions.last(), Some(&TxPurpose::Attachment(failing_key)));
            let attached = result.attachment_outcomes().collect::<Vec<_>>();
            prop_assert_eq!(attached.len(), failing + 1);
            prop_assert!(attached[..failing].iter().all(|o| o.success));
            prop_assert!(!attached[failing].success);
        }
    }
}
