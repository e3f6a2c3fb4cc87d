//! End-to-end scenarios over the embedded facade: the full submit →
//! verify → search → execute → maintain lifecycle.

use crate::exchange::AnchorChoice;
use crate::graph::{BlockedReason, UNREACHABLE};
use crate::inventory::{PageSubmission, StaticProbe};
use crate::storage::{InventoryFilter, MemoryStore};
use crate::types::{
    AnchorType, ContentPlacement, CreditStatus, LinkEdge, LinkType, Tier, UserId,
};
use crate::{LinkMesh, MeshConfig, MeshError};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn mesh() -> LinkMesh<MemoryStore> {
    LinkMesh::in_memory(MeshConfig::default().with_rng_seed(3)).unwrap()
}

fn submission(url: &str) -> PageSubmission {
    PageSubmission {
        page_url: url.to_string(),
        domain_rating: 55,
        trust_flow: 40,
        traffic_estimate: 5000,
        niche: "tech".to_string(),
        tier: Tier::Two,
        link_type: LinkType::Dofollow,
        placement: ContentPlacement::Contextual,
        max_outbound: 3,
        age_months: Some(36),
    }
}

/// Submit and verify one routable page; returns its id.
fn routable_page(mesh: &LinkMesh<MemoryStore>, owner: UserId, url: &str) -> Uuid {
    let report = mesh.submit_inventory(owner, vec![submission(url)]).unwrap();
    assert_eq!(report.submitted.len(), 1, "{:?}", report.rejected);
    mesh.verify_page(report.submitted[0], &StaticProbe::reachable())
        .unwrap();
    report.submitted[0]
}

fn branded(text: &str) -> AnchorChoice {
    AnchorChoice::Explicit {
        text: text.to_string(),
        anchor_type: AnchorType::Branded,
    }
}

#[test]
fn broke_requester_cannot_buy_a_link() {
    let mesh = mesh();
    let owner = Uuid::now_v7();
    let requester = Uuid::now_v7();
    let page = routable_page(&mesh, owner, "https://example.org/guides/rust");

    let err = mesh
        .execute_exchange(requester, page, "https://requester.example/l", branded("R Co"))
        .unwrap_err();
    assert!(matches!(err, MeshError::InsufficientCredits { .. }));

    assert_eq!(mesh.balance(requester).unwrap(), Decimal::ZERO);
    assert!(mesh.store().edges_to(requester).unwrap().is_empty());
    assert_eq!(mesh.stats().unwrap().edge_count, 0);
}

#[test]
fn a_placed_link_blocks_the_return_route() {
    let mesh = mesh();
    let alice = Uuid::now_v7();
    let bob = Uuid::now_v7();

    // Alice buys a link on Bob's page: edge bob → alice.
    let bobs_page = routable_page(&mesh, bob, "https://example.org/guides/rust");
    mesh.grant_credits(alice, dec!(50), "seed").unwrap();
    mesh.execute_exchange(alice, bobs_page, "https://alice.example/l", branded("Alice Co"))
        .unwrap();

    // Bob now tries the reverse through Alice's inventory.
    let alices_page = routable_page(&mesh, alice, "https://example.org/guides/tokio");
    mesh.grant_credits(bob, dec!(50), "seed").unwrap();

    let check = mesh.validate_route(alice, bob).unwrap();
    assert_eq!(check.blocked, Some(BlockedReason::ReciprocalLink));

    let err = mesh
        .execute_exchange(bob, alices_page, "https://bob.example/l", branded("Bob Co"))
        .unwrap_err();
    assert!(matches!(
        err,
        MeshError::RouteBlocked(BlockedReason::ReciprocalLink)
    ));
    assert_eq!(mesh.balance(bob).unwrap(), dec!(50));
}

#[test]
fn two_hop_neighbors_are_too_close_to_trade() {
    let mesh = mesh();
    let a = Uuid::now_v7();
    let b = Uuid::now_v7();
    let c = Uuid::now_v7();

    for (s, t) in [(a, b), (b, c)] {
        let mut e = LinkEdge::new(
            s,
            t,
            Uuid::now_v7(),
            "https://x.example/p",
            "x",
            AnchorType::Branded,
            UNREACHABLE,
            dec!(5),
        );
        e.created_at = Utc::now() - Duration::days(2);
        mesh.store().put_edge(&e).unwrap();
    }

    let check = mesh.validate_route(a, c).unwrap();
    assert_eq!(check.hop_distance, 2);
    assert_eq!(
        check.blocked,
        Some(BlockedReason::HopDistanceTooShort {
            distance: 2,
            minimum: 3
        })
    );
}

#[test]
fn spam_domains_never_sell_whatever_their_rating() {
    let mesh = mesh();
    let owner = Uuid::now_v7();

    let mut spam = submission("https://casino-deals.com/offers/super");
    spam.domain_rating = 90;
    let mut gov = submission("https://example.gov/programs/grants");
    gov.domain_rating = 60;

    let report = mesh.submit_inventory(owner, vec![spam, gov]).unwrap();
    assert_eq!(report.submitted.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].reason.contains("spam keyword"));

    // The .gov page sails through with a near-perfect quality score.
    let page = mesh.store().get_page(report.submitted[0]).unwrap().unwrap();
    assert_eq!(page.domain, "example.gov");
    assert!(page.quality_score >= 80);
}

#[test]
fn full_pages_disappear_from_the_pool() {
    let mesh = mesh();
    let owner = Uuid::now_v7();
    let requester = Uuid::now_v7();
    let page_id = routable_page(&mesh, owner, "https://example.org/guides/rust");

    let mut page = mesh.store().get_page(page_id).unwrap().unwrap();
    page.max_outbound = 2;
    page.current_outbound = 2;
    mesh.store().put_page(&page).unwrap();

    assert!(mesh
        .available_inventory(requester, InventoryFilter::new())
        .unwrap()
        .is_empty());
    assert!(mesh
        .find_routes(requester, InventoryFilter::new())
        .unwrap()
        .is_empty());
}

#[test]
fn pending_credits_settle_only_after_the_hold_window() {
    let mesh = mesh();
    let owner = Uuid::now_v7();
    let requester = Uuid::now_v7();
    let page = routable_page(&mesh, owner, "https://example.org/guides/rust");
    mesh.grant_credits(requester, dec!(50), "seed").unwrap();

    let receipt = mesh
        .execute_exchange(requester, page, "https://requester.example/l", branded("R Co"))
        .unwrap();
    let cost = receipt.cost;
    assert_eq!(mesh.account(owner).unwrap().pending, cost);

    // Five days in: still held.
    let mut edge = mesh.store().get_edge(receipt.link.id).unwrap().unwrap();
    edge.created_at = Utc::now() - Duration::days(5);
    mesh.store().put_edge(&edge).unwrap();
    let summary = mesh.run_maintenance(None, Utc::now()).unwrap();
    assert_eq!(summary.settlement.examined, 0);
    assert_eq!(mesh.account(owner).unwrap().pending, cost);

    // Eight days in with the link still live: converted.
    edge.created_at = Utc::now() - Duration::days(8);
    mesh.store().put_edge(&edge).unwrap();
    let summary = mesh.run_maintenance(None, Utc::now()).unwrap();
    assert_eq!(summary.settlement.converted, vec![receipt.link.id]);

    let account = mesh.account(owner).unwrap();
    assert_eq!(account.balance, cost);
    assert_eq!(account.pending, Decimal::ZERO);
    assert_eq!(account.lifetime_earned, cost);
    assert_eq!(
        mesh.store().get_edge(receipt.link.id).unwrap().unwrap().credit_status,
        CreditStatus::Awarded
    );
}

#[test]
fn dead_links_are_clawed_back_at_the_checkpoint() {
    let mesh = mesh();
    let owner = Uuid::now_v7();
    let requester = Uuid::now_v7();
    let page = routable_page(&mesh, owner, "https://example.org/guides/rust");
    mesh.grant_credits(requester, dec!(50), "seed").unwrap();

    let receipt = mesh
        .execute_exchange(requester, page, "https://requester.example/l", branded("R Co"))
        .unwrap();
    mesh.record_link_observation(receipt.link.id, false, false)
        .unwrap();

    let mut edge = mesh.store().get_edge(receipt.link.id).unwrap().unwrap();
    edge.created_at = Utc::now() - Duration::days(8);
    mesh.store().put_edge(&edge).unwrap();

    let summary = mesh.run_maintenance(None, Utc::now()).unwrap();
    assert_eq!(summary.settlement.clawed_back, vec![receipt.link.id]);

    let account = mesh.account(owner).unwrap();
    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(account.pending, Decimal::ZERO);
    assert_eq!(account.lifetime_earned, Decimal::ZERO);
}

#[test]
fn books_replay_exactly_after_a_busy_lifecycle() {
    let mesh = mesh();
    let requester = Uuid::now_v7();
    mesh.grant_credits(requester, dec!(100), "seed").unwrap();

    // Two exchanges from distinct owners, one of which settles.
    let owners: Vec<UserId> = (0..2).map(|_| Uuid::now_v7()).collect();
    let urls = [
        "https://example.org/guides/rust",
        "https://example.org/guides/tokio",
    ];
    let mut links = Vec::new();
    for (owner, url) in owners.iter().zip(urls) {
        let page = routable_page(&mesh, *owner, url);
        let receipt = mesh
            .execute_exchange(requester, page, "https://requester.example/l", branded("R Co"))
            .unwrap();
        links.push(receipt.link.id);
    }

    let mut edge = mesh.store().get_edge(links[0]).unwrap().unwrap();
    edge.created_at = Utc::now() - Duration::days(8);
    mesh.store().put_edge(&edge).unwrap();
    mesh.run_maintenance(None, Utc::now()).unwrap();

    for user in owners.iter().chain([&requester]) {
        let audit = mesh.audit(*user).unwrap();
        assert!(audit.consistent, "user {} drifted: {:?}", user, audit);
        let account = mesh.account(*user).unwrap();
        assert!(account.balance >= Decimal::ZERO);
        assert!(account.pending >= Decimal::ZERO);
    }

    // Every edge ever created was either unconnected or at a safe
    // distance at creation time.
    for id in links {
        let edge = mesh.store().get_edge(id).unwrap().unwrap();
        assert!(edge.hop_distance_at_creation >= 3);
    }
}

#[test]
fn durable_store_survives_a_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mesh.redb");
    let owner = Uuid::now_v7();
    let requester = Uuid::now_v7();
    let cost;

    {
        let mesh = LinkMesh::open(&path, MeshConfig::default().with_rng_seed(3)).unwrap();
        let report = mesh
            .submit_inventory(owner, vec![submission("https://example.org/guides/rust")])
            .unwrap();
        mesh.verify_page(report.submitted[0], &StaticProbe::reachable())
            .unwrap();
        mesh.grant_credits(requester, dec!(50), "seed").unwrap();
        let receipt = mesh
            .execute_exchange(
                requester,
                report.submitted[0],
                "https://requester.example/l",
                branded("R Co"),
            )
            .unwrap();
        cost = receipt.cost;
    }

    let mesh = LinkMesh::open(&path, MeshConfig::default()).unwrap();
    assert_eq!(mesh.balance(requester).unwrap(), dec!(50) - cost);
    assert_eq!(mesh.account(owner).unwrap().pending, cost);

    let stats = mesh.stats().unwrap();
    assert_eq!(stats.page_count, 1);
    assert_eq!(stats.edge_count, 1);
    assert!(mesh.audit(requester).unwrap().consistent);
}

#[test]
fn cluster_diagnostics_flag_shared_neighborhoods() {
    let mesh = mesh();
    let a = Uuid::now_v7();
    let b = Uuid::now_v7();
    let shared: Vec<UserId> = (0..3).map(|_| Uuid::now_v7()).collect();

    for user in [a, b] {
        for &n in &shared {
            let mut e = LinkEdge::new(
                user,
                n,
                Uuid::now_v7(),
                "https://x.example/p",
                "x",
                AnchorType::Branded,
                UNREACHABLE,
                dec!(5),
            );
            e.created_at = Utc::now() - Duration::days(2);
            mesh.store().put_edge(&e).unwrap();
        }
    }

    assert_eq!(mesh.cluster_risk(a, b).unwrap(), 100);
    let report = mesh.user_patterns(a).unwrap();
    assert_eq!(report.neighbor_count, 3);
}
