//! Applying changed state files back to an in-memory tenant.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use azops::dispatch::{ChangeClass, SkipReason, DEFAULT_OFFER_TYPE};
use azops::provider::{DeploymentLevel, DeploymentMode};
use azops::{parse_name_status, resolve_from_id, DispatchSettings, ScopeContext};
use common::*;
use serde_json::json;

const SUBSCRIPTION_TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2018-05-01/subscriptionDeploymentTemplate.json#";

/// Discovers the sample tenant so change files have scopes to land in.
async fn discovered() -> (TestHarness, Arc<ScopeContext>) {
    let cloud = sample_tenant()
        .enrollment_account("ea-object-1", "billing@contoso.example")
        .enrollment_account("ea-object-2", "finance@contoso.example")
        .build();
    let harness = TestHarness::with_cloud(cloud);
    let ctx = harness.context().await;
    let report = harness.discover_tenant(ctx.clone()).await;
    assert!(report.is_clean(), "{:?}", report.warnings);
    (harness, ctx)
}

fn scope_dir(ctx: &ScopeContext, id: &str) -> PathBuf {
    let descriptor = resolve_from_id(ctx, id).unwrap();
    descriptor
        .state_path
        .parent()
        .and_then(|state_dir| state_dir.parent())
        .unwrap()
        .to_path_buf()
}

fn with_main_template(harness: &TestHarness, resource_types: &[&str]) -> DispatchSettings {
    let path = harness.write_json(
        &harness.temp_path().join("template.json"),
        &main_template(resource_types),
    );
    DispatchSettings {
        main_template: Some(path),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_subscription_file_creates_and_assigns() {
    let (harness, ctx) = discovered().await;
    let group_dir = harness.management_group_dir(&ctx, "mg-prod");
    let file = harness.write_json(
        &group_dir.join("newsub.subscription.json"),
        &json!({ "name": "Prod 2" }),
    );
    // a sibling template and a permissive main template must not turn this
    // into a deployment
    harness.write_json(&group_dir.join("newsub.json"), &main_template(&[]));
    let settings = with_main_template(&harness, &["Microsoft.Subscription/subscriptions"]);

    let report = harness
        .dispatcher(ctx, settings)
        .apply(&[file], &[])
        .await;

    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.deployed.len(), 1);
    assert_eq!(report.deployed[0].class, ChangeClass::Subscription);
    assert!(harness.cloud.deployments().is_empty());

    let created = harness.cloud.created_subscriptions();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "Prod 2");
    assert_eq!(created[0].offer_type, DEFAULT_OFFER_TYPE);
    assert_eq!(created[0].enrollment_account_object_id, "ea-object-1");
    assert_eq!(
        harness.cloud.assignments(),
        vec![(
            "mg-prod".to_string(),
            "00000000-0000-0000-0000-000000000001".to_string()
        )]
    );
}

#[tokio::test]
async fn test_subscription_file_uses_configured_enrollment_account() {
    let (harness, ctx) = discovered().await;
    let file = harness.write_json(
        &harness
            .management_group_dir(&ctx, "mg-dev")
            .join("sandbox.subscription.json"),
        &json!({}),
    );
    let settings = DispatchSettings {
        enrollment_account: Some("finance@contoso.example".to_string()),
        ..Default::default()
    };

    let report = harness.dispatcher(ctx, settings).apply(&[file], &[]).await;

    assert!(report.is_success(), "{:?}", report.failed);
    let created = harness.cloud.created_subscriptions();
    assert_eq!(created[0].name, "sandbox");
    assert_eq!(created[0].enrollment_account_object_id, "ea-object-2");
    assert_eq!(harness.cloud.assignments()[0].0, "mg-dev");
}

#[tokio::test]
async fn test_unknown_enrollment_account_fails_the_file() {
    let (harness, ctx) = discovered().await;
    let file = harness.write_json(
        &harness
            .management_group_dir(&ctx, "mg-dev")
            .join("sandbox.subscription.json"),
        &json!({ "name": "Sandbox" }),
    );
    let settings = DispatchSettings {
        enrollment_account: Some("nobody@contoso.example".to_string()),
        ..Default::default()
    };

    let report = harness.dispatcher(ctx, settings).apply(&[file], &[]).await;

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].message.contains("nobody@contoso.example"));
    assert!(harness.cloud.created_subscriptions().is_empty());
}

#[tokio::test]
async fn test_existing_subscription_is_left_alone() {
    let (harness, ctx) = discovered().await;
    let file = harness.write_json(
        &harness
            .management_group_dir(&ctx, "mg-dev")
            .join("dev.subscription.json"),
        &json!({ "name": "Dev" }),
    );

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[file], &[])
        .await;

    assert_eq!(report.skipped_for(SkipReason::UpToDate).count(), 1);
    assert!(harness.cloud.created_subscriptions().is_empty());
    assert!(harness.cloud.assignments().is_empty());
}

#[tokio::test]
async fn test_sibling_template_wins_over_main_template() {
    let (harness, ctx) = discovered().await;
    let dir = scope_dir(&ctx, &subscription_id(PROD_SUB));
    let sibling = json!({
        "$schema": SUBSCRIPTION_TEMPLATE_SCHEMA,
        "contentVersion": "1.0.0.0",
        "resources": [{ "type": "Microsoft.Resources/tags", "name": "default" }]
    });
    harness.write_json(&dir.join("tags.json"), &sibling);
    let file = harness.write_json(
        &dir.join("tags.parameters.json"),
        &parameters_file(json!({ "Name": "tags" })),
    );
    let settings = with_main_template(&harness, &["Microsoft.Subscription/subscriptions"]);

    let report = harness.dispatcher(ctx, settings).apply(&[file], &[]).await;

    assert!(report.is_success(), "{:?}", report.failed);
    let deployments = harness.cloud.deployments();
    assert_eq!(deployments.len(), 1);
    let deployment = &deployments[0];
    assert_eq!(deployment.name, "AzOps-tags");
    assert_eq!(deployment.template, sibling);
    assert_eq!(deployment.scope_id, subscription_id(PROD_SUB));
    assert_eq!(
        deployment.level,
        DeploymentLevel::Subscription {
            subscription_id: PROD_SUB.to_string()
        }
    );
    assert_eq!(deployment.location.as_deref(), Some("northeurope"));
    assert_eq!(deployment.mode, DeploymentMode::Incremental);
    assert_eq!(deployment.parameters["input"]["value"]["Name"], "tags");
}

#[tokio::test]
async fn test_main_template_deploys_supported_types_only() {
    let (harness, ctx) = discovered().await;
    let group_dir = harness.management_group_dir(&ctx, "mg-prod");
    let supported = harness.write_json(
        &group_dir.join("audit.parameters.json"),
        &parameters_file(json!({
            "Name": "audit",
            "Type": "Microsoft.Authorization/policyAssignments"
        })),
    );
    let unsupported = harness.write_json(
        &group_dir.join("site.parameters.json"),
        &parameters_file(json!({ "Name": "site", "Type": "Microsoft.Web/sites" })),
    );
    let settings = with_main_template(&harness, &["Microsoft.Authorization/policyAssignments"]);

    let report = harness
        .dispatcher(ctx, settings)
        .apply(&[supported, unsupported], &[])
        .await;

    assert_eq!(report.deployed.len(), 1);
    assert_eq!(report.skipped_for(SkipReason::UnsupportedTemplate).count(), 1);

    let deployments = harness.cloud.deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].name, "AzOps-audit");
    assert_eq!(
        deployments[0].template,
        main_template(&["Microsoft.Authorization/policyAssignments"])
    );
    assert_eq!(
        deployments[0].level,
        DeploymentLevel::ManagementGroup {
            management_group: "mg-prod".to_string()
        }
    );
}

#[tokio::test]
async fn test_parameters_without_any_template_are_skipped() {
    let (harness, ctx) = discovered().await;
    let file = harness.write_json(
        &scope_dir(&ctx, &subscription_id(DEV_SUB)).join("lonely.parameters.json"),
        &parameters_file(json!({ "Name": "lonely" })),
    );

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[file], &[])
        .await;

    assert_eq!(report.skipped_for(SkipReason::NoTemplate).count(), 1);
    assert!(harness.cloud.deployments().is_empty());
}

#[tokio::test]
async fn test_resource_group_deployments_carry_no_location() {
    let (harness, ctx) = discovered().await;
    let dir = scope_dir(&ctx, &resource_group_id(PROD_SUB, "App-RG"));
    harness.write_json(&dir.join("storage.json"), &main_template(&[]));
    let file = harness.write_json(
        &dir.join("storage.parameters.json"),
        &parameters_file(json!({ "Name": "storage" })),
    );

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[file], &[])
        .await;

    assert!(report.is_success(), "{:?}", report.failed);
    let deployments = harness.cloud.deployments();
    assert_eq!(
        deployments[0].level,
        DeploymentLevel::ResourceGroup {
            subscription_id: PROD_SUB.to_string(),
            resource_group: "App-RG".to_string()
        }
    );
    assert_eq!(deployments[0].location, None);
}

#[tokio::test]
async fn test_provider_features_and_registrations() {
    let (harness, ctx) = discovered().await;
    let dir = scope_dir(&ctx, &subscription_id(PROD_SUB));
    let features = harness.write_json(
        &dir.join("compute.providerfeatures.json"),
        &json!([{ "ProviderName": "Microsoft.Compute", "FeatureName": "EncryptionAtHost" }]),
    );
    let providers = harness.write_json(
        &dir.join("subscription.resourceproviders.json"),
        &json!([
            { "ProviderNamespace": "Microsoft.Web", "RegistrationState": "Registered" },
            { "ProviderNamespace": "Microsoft.Sql", "RegistrationState": "NotRegistered" }
        ]),
    );

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[features, providers], &[])
        .await;

    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.deployed.len(), 2);
    assert_eq!(
        harness.cloud.registered_features(),
        vec![(
            PROD_SUB.to_string(),
            "Microsoft.Compute".to_string(),
            "EncryptionAtHost".to_string()
        )]
    );
    assert_eq!(
        harness.cloud.registered_providers(),
        vec![(PROD_SUB.to_string(), "Microsoft.Web".to_string())]
    );
}

#[tokio::test]
async fn test_features_outside_a_subscription_fail() {
    let (harness, ctx) = discovered().await;
    let file = harness.write_json(
        &harness
            .management_group_dir(&ctx, "mg-prod")
            .join("compute.providerfeatures.json"),
        &json!([{ "ProviderName": "Microsoft.Compute", "FeatureName": "EncryptionAtHost" }]),
    );

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[file], &[])
        .await;

    assert_eq!(report.failed.len(), 1);
    assert!(harness.cloud.registered_features().is_empty());
}

#[tokio::test]
async fn test_unhandled_files_are_skipped() {
    let (harness, ctx) = discovered().await;
    let sub_dir = scope_dir(&ctx, &subscription_id(PROD_SUB));
    let readme = harness.write_text(&sub_dir.join("README.md"), "# Prod\n");
    let notes = harness.write_json(&sub_dir.join("notes.json"), &json!({ "owner": "ops" }));
    let stray = harness.write_json(
        &harness.temp_path().join("elsewhere").join("x.parameters.json"),
        &parameters_file(json!({ "Name": "x" })),
    );

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[readme, notes, stray], &[])
        .await;

    assert!(report.deployed.is_empty());
    assert_eq!(report.skipped_for(SkipReason::NotJson).count(), 1);
    assert_eq!(report.skipped_for(SkipReason::Unrecognized).count(), 1);
    assert_eq!(report.skipped_for(SkipReason::UnresolvedScope).count(), 1);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_deletions_are_reported_only() {
    let (harness, ctx) = discovered().await;
    let removed = resolve_from_id(&ctx, &resource_group_id(DEV_SUB, "dev-rg"))
        .unwrap()
        .state_path;
    std::fs::remove_file(&removed).unwrap();

    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply(&[], &[removed.clone()])
        .await;

    assert_eq!(report.deletions, vec![removed]);
    assert!(report.deployed.is_empty());
    assert!(harness.cloud.deployments().is_empty());
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_diff_output_drives_dispatch() {
    let (harness, ctx) = discovered().await;
    let dir = scope_dir(&ctx, &subscription_id(PROD_SUB));
    harness.write_json(&dir.join("tags.json"), &main_template(&[]));
    let params = harness.write_json(
        &dir.join("tags.parameters.json"),
        &parameters_file(json!({ "Name": "tags" })),
    );
    let relative = |path: &std::path::Path| {
        path.strip_prefix(harness.temp_path())
            .unwrap()
            .to_string_lossy()
            .into_owned()
    };
    let output = format!(
        "M\t{}\nD\t{}\nR100\t{}\t{}\n",
        relative(&params),
        relative(&dir.join("old.parameters.json")),
        relative(&dir.join("before.json")),
        relative(&dir.join("tags.json")),
    );

    let changes = parse_name_status(&output, harness.temp_path());
    let report = harness
        .dispatcher(ctx, DispatchSettings::default())
        .apply_change_set(&changes)
        .await;

    assert_eq!(report.deployed.len(), 1);
    assert_eq!(report.deployed[0].class, ChangeClass::Parameters);
    // the renamed template has no handler of its own
    assert_eq!(report.skipped_for(SkipReason::Unrecognized).count(), 1);
    assert_eq!(report.deletions.len(), 2);
    assert_eq!(harness.cloud.deployments().len(), 1);
}
