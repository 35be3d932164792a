use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rust_decimal_macros::dec;
use uuid::Uuid;

use repricer_api::middleware::auth::OrgClaims;
use repricer_api::repricing::{decide_approval, DecisionResponse};
use repricer_core::execution::ApprovalStatus;
use repricer_rules::engine::PricingDecision;

fn decision(current: rust_decimal::Decimal, new: rust_decimal::Decimal) -> PricingDecision {
    PricingDecision {
        listing_id: Uuid::new_v4(),
        strategy_id: Some(Uuid::new_v4()),
        strategy_name: "competitive".to_string(),
        current_price: current,
        new_price: new,
        confidence: 0.85,
        reason: "undercut-lowest: undercut competitor by 1%".to_string(),
        rules_applied: vec!["undercut-lowest".to_string()],
        guardrails_passed: true,
        warnings: vec![],
        metadata: serde_json::json!({ "competitor_count": 3 }),
        evaluated_at: Utc::now(),
    }
}

#[test]
fn org_token_roundtrip_preserves_tenant_scope() {
    let secret = b"integration-secret";
    let organization_id = Uuid::new_v4();

    let claims = OrgClaims {
        sub: "user-42".to_string(),
        email: "pricing@seller.example".to_string(),
        organization_id,
        role: "ADMIN".to_string(),
        exp: (Utc::now().timestamp() + 600) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap();

    let decoded = decode::<OrgClaims>(
        &token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .unwrap();

    assert_eq!(decoded.claims.organization_id, organization_id);
    assert!(decoded.claims.is_admin());
}

#[test]
fn expired_token_is_rejected() {
    let secret = b"integration-secret";
    let claims = OrgClaims {
        sub: "user-42".to_string(),
        email: "pricing@seller.example".to_string(),
        organization_id: Uuid::new_v4(),
        role: "MEMBER".to_string(),
        exp: (Utc::now().timestamp() - 600) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap();

    assert!(decode::<OrgClaims>(
        &token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .is_err());
}

#[test]
fn approval_threshold_separates_auto_from_manual() {
    // 4% drop: inside the 15% band
    let small = decision(dec!(25.00), dec!(24.00));
    assert_eq!(decide_approval(&small, 0.15), ApprovalStatus::AutoApplied);

    // 40% drop: a human must sign off
    let large = decision(dec!(25.00), dec!(15.00));
    assert_eq!(
        decide_approval(&large, 0.15),
        ApprovalStatus::PendingApproval
    );
}

#[test]
fn decision_response_serializes_for_the_api() {
    let response = DecisionResponse::from(&decision(dec!(29.99), dec!(28.22)));
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["strategy"], "competitive");
    assert_eq!(value["new_price"], "28.22");
    assert_eq!(value["guardrails_passed"], true);
    assert!(value["rules_applied"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("undercut-lowest")));
}
