//! 策略编译器集成测试

use sros_permissions::{
    CapabilityType, PermissionArtifact, PermissionType, PolicyCompiler, PolicyDocument,
    PolicyError, Qualifier,
};
use std::fs;
use tempfile::TempDir;

const TALKER_LISTENER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<policy version="0.2.0">
  <contexts>
    <context path="/talker">
      <profiles>
        <profile ns="/" node="talker">
          <topics publish="ALLOW">
            <topic>chatter</topic>
          </topics>
          <services reply="ALLOW" request="DENY">
            <service>~/describe_parameters</service>
            <service>~/get_parameters</service>
          </services>
        </profile>
      </profiles>
    </context>
    <context path="/listener">
      <profiles>
        <profile ns="/" node="listener">
          <topics subscribe="ALLOW">
            <topic>/chatter</topic>
          </topics>
          <actions call="ALLOW">
            <action>/fibonacci</action>
          </actions>
        </profile>
      </profiles>
    </context>
  </contexts>
</policy>
"#;

fn write_policy(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("写入策略文件失败");
    path
}

#[test]
fn test_single_topic_grant() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let path = write_policy(
        &dir,
        "policy.xml",
        r#"<policy><contexts><context path="/n1"><profiles><profile ns="/" node="n1">
             <topics subscribe="ALLOW"><topic>/chatter</topic></topics>
           </profile></profiles></context></contexts></policy>"#,
    );

    let document = PolicyDocument::load(&path).expect("加载策略失败");
    let artifacts = PolicyCompiler::new().compile(&document).expect("编译失败");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].identity(), "/n1");

    let root = artifacts[0].to_element();
    let grant = root.child("grant").expect("缺少 grant");
    let topics: Vec<_> = grant.elements_named("topics").collect();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].attributes, vec![("subscribe".to_string(), "ALLOW".to_string())]);

    let expressions: Vec<_> = topics[0].elements().collect();
    assert_eq!(expressions.len(), 1);
    assert_eq!(expressions[0].name, "topic");
    assert_eq!(expressions[0].text(), "/chatter");
}

#[test]
fn test_invalid_qualifier_fails_whole_compile() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let path = write_policy(
        &dir,
        "policy.xml",
        r#"<contexts>
             <context path="/good"><profile>
               <topics subscribe="ALLOW"><topic>/chatter</topic></topics>
             </profile></context>
             <context path="/n1"><profile>
               <actions call="MAYBE"><action>/fibonacci</action></actions>
             </profile></context>
           </contexts>"#,
    );

    let document = PolicyDocument::load(&path).expect("加载策略失败");
    let err = PolicyCompiler::new().compile(&document).unwrap_err();
    assert_eq!(err, PolicyError::UnsupportedQualifier { qualifier: "MAYBE".to_string() });
}

#[test]
fn test_full_policy_compiles_in_document_order() {
    let document = PolicyDocument::from_bytes(TALKER_LISTENER.as_bytes()).expect("解析失败");
    let compiler = PolicyCompiler::new();

    assert_eq!(compiler.resolve_identities(&document), vec!["/talker", "/listener"]);

    let artifacts = compiler.compile(&document).expect("编译失败");
    let talker = &artifacts[0];
    assert_eq!(talker.permissions()[0].expressions()[0].as_str(), "/chatter");

    let services = &talker.permissions()[1];
    assert_eq!(services.permission_type(), PermissionType::Service);
    assert_eq!(services.qualifier(CapabilityType::Reply), Some(Qualifier::Allow));
    assert_eq!(services.qualifier(CapabilityType::Request), Some(Qualifier::Deny));
    let names: Vec<_> = services.expressions().iter().map(|e| e.as_str()).collect();
    assert_eq!(names, vec!["/talker/describe_parameters", "/talker/get_parameters"]);

    let listener = &artifacts[1];
    assert_eq!(listener.permissions()[1].permission_type(), PermissionType::Action);
}

#[test]
fn test_compiled_artifact_round_trip() {
    let document = PolicyDocument::from_bytes(TALKER_LISTENER.as_bytes()).expect("解析失败");
    let artifacts = PolicyCompiler::new().compile(&document).expect("编译失败");

    for artifact in artifacts {
        let bytes = artifact.to_xml().expect("序列化失败");
        let parsed = PermissionArtifact::from_xml(&bytes).expect("解析权限文件失败");
        assert_eq!(parsed, artifact);
        assert_eq!(parsed.to_xml().expect("再次序列化失败"), bytes);
    }
}

#[test]
fn test_capability_outside_type_rejected() {
    let document = PolicyDocument::from_bytes(
        br#"<contexts><context path="/n1"><profile>
              <actions subscribe="ALLOW"><action>/fibonacci</action></actions>
            </profile></context></contexts>"#,
    )
    .expect("解析失败");

    assert_eq!(
        PolicyCompiler::new().compile(&document).unwrap_err(),
        PolicyError::UnsupportedCapabilityType {
            permission_type: PermissionType::Action,
            capability_type: CapabilityType::Subscribe,
        }
    );
}
