//! User kubeconfig assembly

mod common;

use common::{LC, PEM_CERT, PROJECT, harness};
use logical_cloud::{ErrorKind, Kubeconfig};

#[tokio::test]
async fn test_not_instantiated() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;

    let err = h.service.get_cluster_config(PROJECT, LC, "lc-cl-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInstantiated);
}

#[tokio::test]
async fn test_certificate_not_yet_issued() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.admin_kubeconfig("testcp", "testcl", "default").await;
    h.service.instantiate(PROJECT, LC).await.unwrap();

    let err = h.service.get_cluster_config(PROJECT, LC, "lc-cl-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotYetIssued);

    h.write_csr_status(LC, "testcp+testcl", &[], None).await;
    let err = h.service.get_cluster_config(PROJECT, LC, "lc-cl-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotYetIssued);
    let reference = h.service.clusters().get(PROJECT, LC, "lc-cl-1").await.unwrap();
    assert!(reference.spec.certificate.is_empty());
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_issued_certificate_builds_kubeconfig() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.admin_kubeconfig("testcp", "testcl", "default").await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    h.write_csr_status(LC, "testcp+testcl", &["Approved"], Some(PEM_CERT)).await;

    let yaml = h.service.get_cluster_config(PROJECT, LC, "lc-cl-1").await.unwrap();

    assert!(yaml.contains("current-context: lcuser@lc-cl-1"));
    let kubeconfig: Kubeconfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(kubeconfig.clusters[0].name, "lc-cl-1");
    assert_eq!(kubeconfig.clusters[0].cluster.server, "https://testcl.example:6443");
    assert_eq!(kubeconfig.contexts[0].context.namespace, "testns");
    assert!(kubeconfig.users[0].user.client_certificate_data.starts_with("LS0t"));
    assert!(kubeconfig.users[0].user.client_key_data.starts_with("LS0t"));

    let reference = h.service.clusters().get(PROJECT, LC, "lc-cl-1").await.unwrap();
    assert_eq!(reference.spec.certificate, kubeconfig.users[0].user.client_certificate_data);

    let rows = h.store.row_count("cluster");
    let again = h.service.get_cluster_config(PROJECT, LC, "lc-cl-1").await.unwrap();
    assert_eq!(again, yaml);
    assert_eq!(h.store.row_count("cluster"), rows);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_denied_certificate() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.admin_kubeconfig("testcp", "testcl", "default").await;
    h.service.instantiate(PROJECT, LC).await.unwrap();
    h.write_csr_status(LC, "testcp+testcl", &["Denied"], None).await;

    let err = h.service.get_cluster_config(PROJECT, LC, "lc-cl-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CertificateRejected);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_unknown_cluster_reference() {
    let h = harness(true);
    h.standard_cloud(&["testns"]).await;
    h.service.instantiate(PROJECT, LC).await.unwrap();

    let err = h.service.get_cluster_config(PROJECT, LC, "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    h.service.shutdown().await;
}
