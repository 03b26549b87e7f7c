//! Lifecycle tests over in-memory stores and the mock synchronizer

mod common;

use appcontext::{AppContext, AppContextStatus};
use common::{LC, PEM_CERT, PROJECT, cluster_reference, harness, logical_cloud};
use logical_cloud::{ConflictReason, DcmError, ErrorKind};
use rsync_client::RsyncCall;
use std::sync::Arc;

#[tokio::test]
async fn test_instantiate_single_cluster_tree() {
    let h = harness(false);
    h.standard_cloud(&["testns"]).await;

    h.service.instantiate(PROJECT, LC).await.unwrap();

    let ctx = h.context(LC).await;
    let keys = ctx.get_all_keys().await.unwrap();
    assert_eq!(keys.len(), 15, "{keys:#?}");

    let cluster = "app/logical-cloud/cluster/testcp+testcl/";
    for suffix in [
        "resource/testns+Namespace/",
        "resource/testlc-user-csr+CertificateSigningRequest/",
        "resource/testlc-user-csr+CertificateSigningRequest/subresource/approval/",
        "resource/testlc-role0+Role/",
        "resource/testlc-roleBinding0+RoleBinding/",
        "resource/testquota+ResourceQuota/",
        "resource/instruction/order/",
        "resource/instruction/dependency/",
    ] {
        let expected = format!("{cluster}{suffix}");
        assert!(keys.iter().any(|k| k.ends_with(&expected)), "missing {expected}");
    }

    let root = ctx.get_composite_app_handle().await.unwrap();
    let csr = ctx
        .get_level_handle(&root, &format!("{cluster}resource/testlc-user-csr+CertificateSigningRequest"))
        .await
        .unwrap();
    let body = ctx.get_value(&csr).await.unwrap();
    let body = body.as_str().unwrap();
    assert!(body.contains("apiVersion: certificates.k8s.io/v1beta1"));
    assert!(body.contains("kind: CertificateSigningRequest"));
    assert!(body.contains("name: testlc-user-csr"));
    assert!(body.contains("key encipherment"));
    assert!(body.contains("request: LS0"));

    let approval = ctx.get_level_handle(&csr, "subresource/approval").await.unwrap();
    let approval: serde_json::Value =
        serde_json::from_str(ctx.get_value(&approval).await.unwrap().as_str().unwrap()).unwrap();
    assert_eq!(approval["type"], "Approved");
    assert_eq!(approval["reason"], "LogicalCloud");
    assert_eq!(approval["message"], "Approved for Logical Cloud authentication");

    assert!(h.rsync.calls().contains(&RsyncCall::Install(ctx.id().to_string())));
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_instantiate_two_permissions() {
    let h = harness(false);
    h.standard_cloud(&["testns", ""]).await;

    h.service.instantiate(PROJECT, LC).await.unwrap();

    let ctx = h.context(LC).await;
    let keys = ctx.get_all_keys().await.unwrap();
    assert_eq!(keys.len(), 17, "{keys:#?}");
    assert!(keys.iter().any(|k| k.ends_with("resource/testlc-clusterRole1+ClusterRole/")));
    assert!(keys.iter().any(|k| k.ends_with("resource/testlc-clusterRoleBinding1+ClusterRoleBinding/")));

    let root = ctx.get_composite_app_handle().await.unwrap();
    let dependencies = ctx
        .get_level_handle(&root, "app/logical-cloud/cluster/testcp+testcl/resource/instruction/dependency")
        .await
        .unwrap();
    let dependencies = ctx.get_value(&dependencies).await.unwrap();
    assert_eq!(
        dependencies["resdependency"]["testlc-clusterRole1+ClusterRole"],
        "wait on testlc-user-csr+CertificateSigningRequest"
    );
    assert_eq!(
        dependencies["resdependency"]["testlc-clusterRoleBinding1+ClusterRoleBinding"],
        "wait on testlc-clusterRole1+ClusterRole"
    );
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_missing_permissions_leave_no_context() {
    let h = harness(false);
    h.standard_cloud(&[]).await;

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionMissing);
    assert!(h.contexts.is_empty());
    assert!(h.rsync.calls().is_empty());
}

#[tokio::test]
async fn test_permission_outside_primary_namespace_rejected() {
    let h = harness(false);
    h.standard_cloud(&["otherns"]).await;

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionMissing);
    assert!(h.contexts.is_empty());
}

#[tokio::test]
async fn test_standard_cloud_without_namespace_rejected() {
    let h = harness(false);
    h.standard_cloud(&[""]).await;
    let mut lc = h.service.logical_clouds().get(PROJECT, LC).await.unwrap();
    lc.spec.namespace.clear();
    let clusters = h.service.clusters().get_all(PROJECT, LC).await.unwrap();
    let quotas = h.service.quotas().get_all(PROJECT, LC).await.unwrap();
    let permissions = h.service.user_permissions().get_all(PROJECT, LC).await.unwrap();

    let err = h
        .service
        .engine()
        .instantiate(PROJECT, &lc, &clusters, &quotas, &permissions)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionMissing);
    assert!(h.contexts.is_empty());
    assert!(h.rsync.calls().is_empty());
}

#[tokio::test]
async fn test_no_clusters_rejected() {
    let h = harness(false);
    h.service.projects().create(PROJECT).await.unwrap();
    h.service
        .logical_clouds()
        .create(PROJECT, logical_cloud(LC, "1", "testns"))
        .await
        .unwrap();

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionMissing);
}

async fn admin_cloud(h: &common::Harness) {
    h.service.projects().create(PROJECT).await.unwrap();
    h.service
        .logical_clouds()
        .create(PROJECT, logical_cloud("admin", "0", ""))
        .await
        .unwrap();
    for (name, cluster) in [("ref-a", "cl-a"), ("ref-b", "cl-b")] {
        h.service
            .clusters()
            .create(PROJECT, "admin", cluster_reference(name, "testcp", cluster))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_admin_cloud_mixed_namespaces() {
    let h = harness(false);
    admin_cloud(&h).await;
    h.admin_kubeconfig("testcp", "cl-a", "default").await;
    h.admin_kubeconfig("testcp", "cl-b", "kube-system").await;

    let err = h.service.instantiate(PROJECT, "admin").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionMixedNamespaces);
    let lc = h.service.logical_clouds().get(PROJECT, "admin").await.unwrap();
    assert_eq!(lc.spec.namespace, "");
    assert!(h.contexts.is_empty());
}

#[tokio::test]
async fn test_admin_cloud_unknown_cluster() {
    let h = harness(false);
    admin_cloud(&h).await;
    h.admin_kubeconfig("testcp", "cl-a", "default").await;

    let err = h.service.instantiate(PROJECT, "admin").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_admin_cloud_adopts_namespace() {
    let h = harness(false);
    admin_cloud(&h).await;
    h.admin_kubeconfig("testcp", "cl-a", "default").await;
    h.admin_kubeconfig("testcp", "cl-b", "default").await;

    h.service.instantiate(PROJECT, "admin").await.unwrap();

    let lc = h.service.logical_clouds().get(PROJECT, "admin").await.unwrap();
    assert_eq!(lc.spec.namespace, "default");
    let ctx = h.context("admin").await;
    assert_eq!(ctx.get_all_keys().await.unwrap().len(), 8);
    assert_eq!(h.rsync.calls(), vec![RsyncCall::Install(ctx.id().to_string())]);
}

#[tokio::test]
async fn test_instantiate_twice_conflicts() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let before = h.context(LC).await.get_all_keys().await.unwrap();

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();

    assert_eq!(err.conflict_reason(), Some(&ConflictReason::AlreadyInstantiated));
    assert_eq!(h.context(LC).await.get_all_keys().await.unwrap(), before);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_terminate_then_terminate_again() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let id = h.context(LC).await.id().to_string();

    h.service.terminate(PROJECT, LC).await.unwrap();
    assert_eq!(h.context(LC).await.get_status().await.unwrap(), AppContextStatus::Terminated);
    assert!(h.rsync.calls().contains(&RsyncCall::Uninstall(id.clone())));
    assert!(!h.rsync.is_subscribed(&id));

    let err = h.service.terminate(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.conflict_reason(), Some(&ConflictReason::AlreadyTerminated));
}

#[tokio::test]
async fn test_terminate_never_instantiated() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;

    let err = h.service.terminate(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInstantiated);
}

#[tokio::test]
async fn test_reinstantiate_after_terminate() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let first = h.context(LC).await.id().to_string();
    h.service.terminate(PROJECT, LC).await.unwrap();

    h.service.instantiate(PROJECT, LC).await.unwrap();

    let second = h.context(LC).await;
    assert_ne!(second.id(), first);
    assert_eq!(second.get_status().await.unwrap(), AppContextStatus::Instantiated);
    let old = AppContext::load(Arc::new(h.contexts.clone()), &first).await;
    assert!(old.is_err());
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_failed_install_is_retried_on_same_context() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.rsync.fail("install_app", "connection refused");

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    let id = h.context(LC).await.id().to_string();
    assert!(matches!(
        h.context(LC).await.get_status().await,
        Err(appcontext::AppContextError::NotFound(_))
    ));

    let err = h.service.terminate(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInstantiated);
    let err = h
        .service
        .clusters()
        .create(PROJECT, LC, cluster_reference("lc-cl-2", "testcp", "other"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictState);

    h.rsync.clear_failure("install_app");
    h.service.instantiate(PROJECT, LC).await.unwrap();

    let ctx = h.context(LC).await;
    assert_eq!(ctx.id(), id);
    assert_eq!(ctx.get_status().await.unwrap(), AppContextStatus::Instantiated);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_build_failure_removes_partial_context() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.contexts.inject_fault("put", "disk full");

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();

    assert!(!matches!(err, DcmError::WithCleanup { .. }));
    assert!(h.contexts.is_empty());
    assert_eq!(h.backends.context_id(PROJECT, LC).await.unwrap(), None);
    assert!(h.rsync.calls().is_empty());
}

#[tokio::test]
async fn test_build_and_cleanup_failure_reports_both() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.contexts.inject_fault("put", "disk full");
    h.contexts.inject_fault("delete_prefix", "read-only");

    let err = h.service.instantiate(PROJECT, LC).await.unwrap_err();

    assert!(matches!(err, DcmError::WithCleanup { .. }));
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_cluster_membership_frozen_while_instantiated() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();

    let err = h
        .service
        .clusters()
        .create(PROJECT, LC, cluster_reference("lc-cl-2", "testcp", "other"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictState);
    let err = h.service.clusters().delete(PROJECT, LC, "lc-cl-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictState);

    h.service.terminate(PROJECT, LC).await.unwrap();
    h.service
        .clusters()
        .create(PROJECT, LC, cluster_reference("lc-cl-2", "testcp", "other"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_level_and_namespace_frozen_while_instantiated() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;

    let err = h
        .service
        .logical_clouds()
        .update(PROJECT, LC, logical_cloud(LC, "0", "testns"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    h.service.instantiate(PROJECT, LC).await.unwrap();
    let err = h
        .service
        .logical_clouds()
        .update(PROJECT, LC, logical_cloud(LC, "1", "otherns"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictState);
    let lc = h.service.logical_clouds().get(PROJECT, LC).await.unwrap();
    assert_eq!(lc.spec.namespace, "testns");

    h.service.terminate(PROJECT, LC).await.unwrap();
    h.service
        .logical_clouds()
        .update(PROJECT, LC, logical_cloud(LC, "1", "otherns"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_after_failed_termination_uninstalls_again() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let id = h.context(LC).await.id().to_string();
    h.service.terminate(PROJECT, LC).await.unwrap();
    h.service.clusters().delete(PROJECT, LC, "lc-cl-1").await.unwrap();
    h.service.quotas().delete(PROJECT, LC, "testquota").await.unwrap();
    h.service.user_permissions().delete(PROJECT, LC, "testup0").await.unwrap();
    h.context(LC)
        .await
        .set_status(&AppContextStatus::TerminateFailed)
        .await
        .unwrap();

    h.service.delete_logical_cloud(PROJECT, LC).await.unwrap();

    let uninstalls = h
        .rsync
        .calls()
        .iter()
        .filter(|call| **call == RsyncCall::Uninstall(id.clone()))
        .count();
    assert_eq!(uninstalls, 2);
    assert!(h.contexts.is_empty());
    let err = h.service.logical_clouds().get(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_stop() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;

    let err = h.service.stop(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInstantiated);

    h.service.instantiate(PROJECT, LC).await.unwrap();
    let err = h.service.stop(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.conflict_reason(), Some(&ConflictReason::NotTransitioning));

    h.context(LC)
        .await
        .set_status(&AppContextStatus::Instantiating)
        .await
        .unwrap();
    let err = h.service.stop(PROJECT, LC).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);

    let err = h.service.stop(PROJECT, "missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_readiness_waits_for_every_certificate() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.admin_kubeconfig("testcp", "testcl", "default").await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let id = h.context(LC).await.id().to_string();
    assert!(h.rsync.is_subscribed(&id));

    assert!(h.rsync.notify(&id));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(h.rsync.is_subscribed(&id));
    assert!(!h.rsync.calls().contains(&RsyncCall::Unsubscribe(id.clone())));

    h.write_csr_status(LC, "testcp+testcl", &["Approved"], Some(PEM_CERT)).await;
    assert!(h.rsync.notify(&id));

    assert!(
        h.eventually(|h| h.rsync.calls().contains(&RsyncCall::Unsubscribe(id.clone())))
            .await
    );
    let reference = h.service.clusters().get(PROJECT, LC, "lc-cl-1").await.unwrap();
    assert!(reference.spec.certificate.starts_with("LS0t"));
    assert!(h.cloud_configs_has_user_entry().await);

    h.service.terminate(PROJECT, LC).await.unwrap();
    let unsubscribes = h
        .rsync
        .calls()
        .iter()
        .filter(|call| **call == RsyncCall::Unsubscribe(id.clone()))
        .count();
    assert_eq!(unsubscribes, 1);
    assert!(!h.cloud_configs_has_user_entry().await);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_readiness_waits_for_second_cluster() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service
        .clusters()
        .create(PROJECT, LC, cluster_reference("lc-cl-2", "testcp", "cl-2"))
        .await
        .unwrap();
    h.admin_kubeconfig("testcp", "testcl", "default").await;
    h.admin_kubeconfig("testcp", "cl-2", "default").await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let id = h.context(LC).await.id().to_string();

    h.write_csr_status(LC, "testcp+testcl", &["Approved"], Some(PEM_CERT)).await;
    assert!(h.rsync.notify(&id));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert!(h.rsync.is_subscribed(&id));
    assert!(!h.rsync.calls().contains(&RsyncCall::Unsubscribe(id.clone())));
    assert!(!h.cloud_configs_has_user_entry().await);
    let first = h.service.clusters().get(PROJECT, LC, "lc-cl-1").await.unwrap();
    assert!(first.spec.certificate.is_empty());

    h.write_csr_status(LC, "testcp+cl-2", &["Approved"], Some(PEM_CERT)).await;
    assert!(h.rsync.notify(&id));

    assert!(
        h.eventually(|h| h.rsync.calls().contains(&RsyncCall::Unsubscribe(id.clone())))
            .await
    );
    for name in ["lc-cl-1", "lc-cl-2"] {
        let reference = h.service.clusters().get(PROJECT, LC, name).await.unwrap();
        assert!(reference.spec.certificate.starts_with("LS0t"), "{name}");
    }
    h.service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_readiness_retries_after_failed_notification() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.admin_kubeconfig("testcp", "testcl", "default").await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let id = h.context(LC).await.id().to_string();
    h.write_csr_status(LC, "testcp+testcl", &["Approved"], Some(PEM_CERT)).await;

    h.contexts.inject_fault("get", "connection reset");
    assert!(h.rsync.notify(&id));
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    assert!(h.rsync.is_subscribed(&id));
    assert!(!h.cloud_configs_has_user_entry().await);

    h.contexts.clear_fault("get");
    assert!(h.rsync.notify(&id));

    assert!(
        h.eventually(|h| h.rsync.calls().contains(&RsyncCall::Unsubscribe(id.clone())))
            .await
    );
    assert!(h.cloud_configs_has_user_entry().await);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_cancels_readiness_tasks() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    let id = h.context(LC).await.id().to_string();
    assert!(h.service.engine().supervisor().is_running(&id));

    h.service.shutdown().await;

    assert!(!h.service.engine().supervisor().is_running(&id));
}

impl common::Harness {
    async fn cloud_configs_has_user_entry(&self) -> bool {
        use rsync_client::CloudConfigTrait;
        self.cloud_configs
            .get_cloud_config("testcp", "testcl", "1", "testns")
            .await
            .is_ok()
    }
}
