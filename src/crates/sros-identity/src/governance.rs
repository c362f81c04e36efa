//! # 治理文档
//!
//! 密钥库级别的治理规则，所有身份共用一份，由 CA 签名。

use sros_permissions::Element;

/// 默认治理文档：所有域、所有话题都要求认证和加密
pub fn default_governance() -> Element {
    let domains = Element::new("domains").with_child(
        Element::new("id_range")
            .with_child(Element::new("min").with_text("0"))
            .with_child(Element::new("max").with_text("230")),
    );

    let topic_rule = Element::new("topic_rule")
        .with_child(Element::new("topic_expression").with_text("*"))
        .with_child(Element::new("enable_discovery_protection").with_text("true"))
        .with_child(Element::new("enable_liveliness_protection").with_text("true"))
        .with_child(Element::new("enable_read_access_control").with_text("true"))
        .with_child(Element::new("enable_write_access_control").with_text("true"))
        .with_child(Element::new("metadata_protection_kind").with_text("ENCRYPT"))
        .with_child(Element::new("data_protection_kind").with_text("ENCRYPT"));

    let domain_rule = Element::new("domain_rule")
        .with_child(domains)
        .with_child(Element::new("allow_unauthenticated_participants").with_text("false"))
        .with_child(Element::new("enable_join_access_control").with_text("true"))
        .with_child(Element::new("discovery_protection_kind").with_text("ENCRYPT"))
        .with_child(Element::new("liveliness_protection_kind").with_text("ENCRYPT"))
        .with_child(Element::new("rtps_protection_kind").with_text("SIGN"))
        .with_child(Element::new("topic_access_rules").with_child(topic_rule));

    Element::new("dds").with_child(Element::new("domain_access_rules").with_child(domain_rule))
}
