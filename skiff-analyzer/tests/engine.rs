//! End-to-end engine tests: register modules, drain the queue, query types

use async_trait::async_trait;
use im::OrdMap;
use skiff_analyzer::{
    update_rules, AnalysisError, AnalysisRule, AnalysisState, AnalyzerConfig, BindingKind,
    CancellationToken, ContextId, ImportDirective, ImportFromModule, ImportedName,
    LanguageService, LiteralKind, ModuleInput, ModuleStatus, Result, RuleResults,
};
use skiff_values::{builtins, TypeSet, Variable};
use std::sync::Arc;

fn ctx() -> ContextId {
    ContextId::new("test", "1.0")
}

fn lit(kind: LiteralKind) -> BindingKind {
    BindingKind::Literal(kind)
}

#[tokio::test]
async fn single_module_alias_converges() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let input = ModuleInput::new()
        .bind("x", lit(LiteralKind::Int))
        .alias("x", "y");
    let state = service.add_module(&ctx(), "m", &input).await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "m", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{int}");
    assert_eq!(state.status().await, ModuleStatus::Converged);
}

#[tokio::test]
async fn rebinding_widens_the_type_set() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let input = ModuleInput::new()
        .bind("x", lit(LiteralKind::Int))
        .bind("x", lit(LiteralKind::Str));
    service.add_module(&ctx(), "m", &input).await;
    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "m", "x", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{int, str}");
}

#[tokio::test]
async fn import_pulls_types_across_modules() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{int}");
}

#[tokio::test]
async fn alias_of_an_import_settles_in_one_run() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Float)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new()
                .import(ImportDirective::named(
                    "a",
                    vec![ImportedName::new("x", "y")],
                ))
                .alias("y", "z"),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "b", "z", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{float}");
}

#[tokio::test]
async fn editing_upstream_replaces_downstream_types() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();
    let before = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(before.to_annotation(), "{int}");

    // Edit: x is now a string. The old inference must not linger.
    service
        .update_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Str)),
        )
        .await
        .unwrap();
    service.run_until_idle(&cancel).await.unwrap();

    let after = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(after.to_annotation(), "{str}");
}

#[tokio::test]
async fn dependency_edit_requeues_dependents() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();
    let requeues_before = service.requeue_count();

    service
        .update_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Bool)),
        )
        .await
        .unwrap();
    service.run_until_idle(&cancel).await.unwrap();

    assert!(service.requeue_count() > requeues_before);
    let types = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{bool}");
}

#[tokio::test]
async fn unresolved_import_is_retried_when_the_module_arrives() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let b = service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    let empty = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert!(empty.is_empty());
    assert!(b.has_pending_import());

    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{int}");
    assert!(!b.has_pending_import());
}

#[tokio::test]
async fn circular_imports_converge() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new()
                .bind("x", lit(LiteralKind::Int))
                .import(ImportDirective::named(
                    "b",
                    vec![ImportedName::new("y", "by")],
                )),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new()
                .bind("y", lit(LiteralKind::Str))
                .import(ImportDirective::named(
                    "a",
                    vec![ImportedName::new("x", "ax")],
                )),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let by = service.get_types(&ctx(), "a", "by", &cancel).await.unwrap();
    let ax = service.get_types(&ctx(), "b", "ax", &cancel).await.unwrap();
    assert_eq!(by.to_annotation(), "{str}");
    assert_eq!(ax.to_annotation(), "{int}");
}

#[tokio::test]
async fn wildcard_import_excludes_internal_names() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new()
                .bind("x", lit(LiteralKind::Int))
                .bind("C", BindingKind::Class),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::wildcard("a")),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let x = service.get_types(&ctx(), "b", "x", &cancel).await.unwrap();
    let c = service.get_types(&ctx(), "b", "C", &cancel).await.unwrap();
    let own = service
        .get_types(&ctx(), "b", "$module", &cancel)
        .await
        .unwrap();
    assert_eq!(x.to_annotation(), "{int}");
    assert_eq!(c.to_annotation(), "{class a.C}");
    // b's $module stays b's own, never a's.
    assert_eq!(own.to_annotation(), "{module b}");
}

#[tokio::test]
async fn module_as_value_import() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(&ctx(), "a", &ModuleInput::new())
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::module_as_value("a")],
            )),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "b", "a", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{module a}");
}

#[tokio::test]
async fn converged_state_reruns_as_a_noop() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    let b = service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();
    let version = b.version();

    let outcome = update_rules(&service, &b, &cancel).await.unwrap();
    assert_eq!(outcome.passes, 1);
    assert!(!outcome.changed);
    assert_eq!(b.version(), version);
}

#[tokio::test]
async fn unchanged_dependency_version_skips_recompute() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    let rule = Arc::new(ImportFromModule::new("a", "x", ["y"]));
    let b = service.add_module(&ctx(), "b", &ModuleInput::new()).await;
    service.run_until_idle(&cancel).await.unwrap();
    b.seed(
        OrdMap::new(),
        vec![rule.clone() as Arc<dyn AnalysisRule>],
    )
    .await;

    update_rules(&service, &b, &cancel).await.unwrap();
    assert_eq!(rule.recompute_count(), 1);

    // Same upstream version: the rule must not re-read the exports.
    update_rules(&service, &b, &cancel).await.unwrap();
    update_rules(&service, &b, &cancel).await.unwrap();
    assert_eq!(rule.recompute_count(), 1);
}

#[tokio::test]
async fn cross_context_lookup_prefers_same_context() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let c1 = ContextId::new("interp", "2.7");
    let c2 = ContextId::new("interp", "3.0");
    service
        .add_module(
            &c1,
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &c2,
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Str)),
        )
        .await;
    service
        .add_module(
            &c2,
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&c2, "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{str}");
}

#[tokio::test]
async fn import_falls_back_to_other_contexts() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let c1 = ContextId::new("interp", "2.7");
    let c2 = ContextId::new("interp", "3.0");
    service
        .add_module(
            &c1,
            "shared",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &c2,
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "shared",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&c2, "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{int}");
}

#[tokio::test]
async fn removed_module_is_unavailable_and_reregistration_refreshes() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    let b = service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    assert!(service.remove_module(&ctx(), "a").await);
    service.run_until_idle(&cancel).await.unwrap();

    // Unresolved again; the last-known inference is kept until the module
    // comes back, but the state is flagged for retry.
    assert!(b.has_pending_import());
    let gone = service.get_types(&ctx(), "a", "x", &cancel).await.unwrap();
    assert!(gone.is_empty());

    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Str)),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{str}");
}

#[tokio::test]
async fn readd_without_intervening_run_refreshes_importer() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().import(ImportDirective::named(
                "a",
                vec![ImportedName::new("x", "y")],
            )),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    // Remove and re-register back to back: the importer never observes
    // the gap, and the fresh state's version counter restarts at 1.
    assert!(service.remove_module(&ctx(), "a").await);
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Str)),
        )
        .await;
    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "b", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{str}");
}

#[tokio::test]
async fn unknown_module_yields_empty_types() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let types = service
        .get_types(&ctx(), "nope", "x", &cancel)
        .await
        .unwrap();
    assert!(types.is_empty());
}

#[tokio::test]
async fn cancellation_preserves_pending_work() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;

    cancel.cancel();
    let err = service.run_until_idle(&cancel).await.unwrap_err();
    assert_eq!(err, AnalysisError::Cancelled);
    assert_eq!(service.pending_len(), 1);

    let fresh = CancellationToken::new();
    service.run_until_idle(&fresh).await.unwrap();
    let types = service.get_types(&ctx(), "a", "x", &fresh).await.unwrap();
    assert_eq!(types.to_annotation(), "{int}");
}

/// A rule that claims a new result on every pass, to exercise the cap
#[derive(Debug)]
struct NeverSettles;

#[async_trait]
impl AnalysisRule for NeverSettles {
    async fn apply(
        &self,
        _service: &LanguageService,
        _owner: &Arc<AnalysisState>,
        _results: &RuleResults,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        cancel.bail_if_cancelled()?;
        Ok(true)
    }

    fn contribution(&self) -> OrdMap<Arc<str>, TypeSet> {
        OrdMap::new()
    }

    fn contribution_for(&self, _name: &str) -> Option<TypeSet> {
        None
    }

    fn recompute_count(&self) -> u64 {
        0
    }
}

impl std::fmt::Display for NeverSettles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "never settles")
    }
}

#[tokio::test]
async fn non_convergence_suspends_and_reports() {
    let config = AnalyzerConfig {
        max_passes: 4,
        ..AnalyzerConfig::default()
    };
    let service = LanguageService::new(config);
    let cancel = CancellationToken::new();
    let state = service.add_module(&ctx(), "m", &ModuleInput::new()).await;
    state
        .seed(OrdMap::new(), vec![Arc::new(NeverSettles) as Arc<dyn AnalysisRule>])
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    assert_eq!(state.status().await, ModuleStatus::Suspended);
    let diagnostics = service.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].moniker, "m");
    assert_eq!(diagnostics[0].passes, 4);

    // Suspended states sit out further runs until the next edit.
    service.schedule_module(state.clone());
    service.run_until_idle(&cancel).await.unwrap();
    assert_eq!(service.diagnostics().len(), 1);

    // A re-seed lifts the suspension.
    service
        .update_module(
            &ctx(),
            "m",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await
        .unwrap();
    service.run_until_idle(&cancel).await.unwrap();
    assert_eq!(state.status().await, ModuleStatus::Converged);
}

#[tokio::test]
async fn monotone_growth_within_a_run() {
    // Two imports landing on the same target name union, never overwrite.
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    service
        .add_module(
            &ctx(),
            "a",
            &ModuleInput::new().bind("x", lit(LiteralKind::Int)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "b",
            &ModuleInput::new().bind("x", lit(LiteralKind::Str)),
        )
        .await;
    service
        .add_module(
            &ctx(),
            "c",
            &ModuleInput::new()
                .import(ImportDirective::named(
                    "a",
                    vec![ImportedName::new("x", "y")],
                ))
                .import(ImportDirective::named(
                    "b",
                    vec![ImportedName::new("x", "y")],
                )),
        )
        .await;

    service.run_until_idle(&cancel).await.unwrap();

    let types = service.get_types(&ctx(), "c", "y", &cancel).await.unwrap();
    assert_eq!(types.to_annotation(), "{int, str}");
    assert!(TypeSet::single(builtins::int()).is_superset_of(&TypeSet::single(builtins::int())));
    assert!(types.is_superset_of(&TypeSet::single(builtins::int())));
}

#[tokio::test]
async fn variable_seed_produces_module_binding() {
    let service = LanguageService::default();
    let cancel = CancellationToken::new();
    let state = service.add_module(&ctx(), "m", &ModuleInput::new()).await;
    service.run_until_idle(&cancel).await.unwrap();

    let names = state.variable_names().await.unwrap();
    assert_eq!(names, vec![Arc::<str>::from("$module")]);
    let var = Variable::with_types(
        "m",
        service
            .get_types(&ctx(), "m", "$module", &cancel)
            .await
            .unwrap(),
    );
    assert_eq!(var.to_annotation_string(), "m = {module m}");
}
