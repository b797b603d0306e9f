mod common;

use common::Client;
use mooncafe::{
    protocol::{MemberView, NoticeKind, RejectReason, ReplySnapshot, ServerEvent},
    AppState, Config,
};
use serde_json::json;

fn member(nickname: &str) -> MemberView {
    MemberView {
        nickname: nickname.to_owned(),
        flair: String::new(),
        avatar: "👤".to_owned(),
    }
}

#[test]
fn alpha_walkthrough() {
    let app = AppState::new(Config::default());

    let mut a = Client::connect(&app);
    a.join("A", "t1", "alpha");
    assert_eq!(
        a.drain(),
        vec![
            ServerEvent::HistorySnapshot { messages: vec![] },
            ServerEvent::MemberList { members: vec![member("A")] },
            ServerEvent::SystemNotice { kind: NoticeKind::Join, nickname: "A".to_owned() },
        ]
    );

    let mut b = Client::connect(&app);
    b.join("A", "t2", "alpha");
    assert_eq!(
        b.drain(),
        vec![ServerEvent::JoinRejected { reason: RejectReason::NicknameInUse }]
    );
    assert!(b.session.circle().is_none());
    assert!(a.drain().is_empty());

    a.send("hi");
    let messages = a.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].author_nickname, "A");
    assert_eq!(messages[0].text, "hi");
    assert_eq!(messages[0].style, json!({ "fontWeight": "bold" }));
    assert_eq!(messages[0].reply_to, None);

    a.session.disconnect();
    assert!(app.registry.get("alpha").is_none());
    assert!(app.registry.is_empty());
}

#[test]
fn rejected_client_can_retry_with_another_nickname() {
    let app = AppState::new(Config::default());
    let mut a = Client::connect(&app);
    a.join("A", "t1", "alpha");

    let mut b = Client::connect(&app);
    b.join("A", "t2", "alpha");
    b.join("B", "t2", "alpha");

    assert!(b.session.circle().is_some());
    let names: Vec<String> = app
        .registry
        .get("alpha")
        .map(|c| c.members().into_iter().map(|m| m.nickname).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn same_token_reconnect_is_admitted() {
    let app = AppState::new(Config::default());
    let mut old = Client::connect(&app);
    old.join("A", "t1", "alpha");
    let mut new = Client::connect(&app);
    new.join("A", "t1", "alpha");

    assert!(new.session.circle().is_some());
    old.session.disconnect();
    assert_eq!(
        app.registry.get("alpha").map(|c| c.members()),
        Some(vec![member("A")])
    );
}

#[test]
fn members_observe_posts_in_acceptance_order() {
    let app = AppState::new(Config::default());
    let mut a = Client::connect(&app);
    let mut b = Client::connect(&app);
    a.join("A", "t1", "alpha");
    b.join("B", "t2", "alpha");
    a.drain();
    b.drain();

    a.send("one");
    b.send("two");
    a.send("three");

    let seen_by_a: Vec<(u64, String)> = a.messages().into_iter().map(|m| (m.seq, m.text)).collect();
    let seen_by_b: Vec<(u64, String)> = b.messages().into_iter().map(|m| (m.seq, m.text)).collect();
    assert_eq!(seen_by_a, seen_by_b);
    assert_eq!(
        seen_by_a,
        vec![(0, "one".to_owned()), (1, "two".to_owned()), (2, "three".to_owned())]
    );
}

#[test]
fn late_joiner_sees_only_the_newest_fifty() {
    let app = AppState::new(Config::default());
    let mut a = Client::connect(&app);
    a.join("A", "t1", "alpha");
    for i in 0..51 {
        a.send(&format!("message {i}"));
    }

    let mut late = Client::connect(&app);
    late.join("Late", "t9", "alpha");
    let Some(ServerEvent::HistorySnapshot { messages }) = late.drain().into_iter().next() else {
        panic!("late joiner should get a history snapshot first");
    };

    assert_eq!(messages.len(), 50);
    assert_eq!(messages.first().map(|m| m.text.as_str()), Some("message 1"));
    assert_eq!(messages.last().map(|m| m.text.as_str()), Some("message 50"));
    assert!(messages.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[test]
fn replies_carry_a_snapshot_until_eviction() {
    let app = AppState::new(Config { history_capacity: 3, ..Config::default() });
    let mut a = Client::connect(&app);
    let mut b = Client::connect(&app);
    a.join("A", "t1", "alpha");
    b.join("B", "t2", "alpha");
    a.drain();
    b.drain();

    a.send("original");
    let original = a.messages().remove(0);
    b.drain();

    b.reply("answer", Some(&original.id));
    let answer = b.messages().remove(0);
    assert_eq!(
        answer.reply_to,
        Some(ReplySnapshot { author_nickname: "A".to_owned(), text: "original".to_owned() })
    );

    b.reply("dangling", Some("not-an-id"));
    assert_eq!(b.messages().remove(0).reply_to, None);

    // history is now [original, answer, dangling]; one more evicts `original`
    a.send("filler");
    a.drain();
    b.drain();

    // the earlier snapshot survives the eviction of its source
    let history = app.registry.get("alpha").map(|c| c.history()).unwrap_or_default();
    assert!(history.iter().all(|m| m.id != original.id));
    assert!(history.iter().any(|m| m.text == "answer" && m.reply_to.is_some()));

    b.reply("too late", Some(&original.id));
    let late = b.messages().remove(0);
    assert_eq!(late.text, "too late");
    assert_eq!(late.reply_to, None);
}

#[test]
fn emptied_circle_starts_fresh() {
    let app = AppState::new(Config::default());
    let mut a = Client::connect(&app);
    a.join("A", "t1", "alpha");
    a.send("remember me");
    a.session.disconnect();

    let mut b = Client::connect(&app);
    b.join("B", "t2", "alpha");
    assert_eq!(
        b.drain().into_iter().next(),
        Some(ServerEvent::HistorySnapshot { messages: vec![] })
    );
}

#[test]
fn circles_are_isolated() {
    let app = AppState::new(Config::default());
    let mut a = Client::connect(&app);
    let mut b = Client::connect(&app);
    a.join("A", "t1", "alpha");
    b.join("A", "t2", "beta");
    assert!(b.session.circle().is_some());
    a.drain();
    b.drain();

    a.send("only alpha");
    assert!(b.drain().is_empty());
    assert_eq!(app.registry.ids(), vec!["alpha".to_owned(), "beta".to_owned()]);
}

#[test]
fn disconnect_before_join_changes_nothing() {
    let app = AppState::new(Config::default());
    let mut a = Client::connect(&app);
    a.session.disconnect();
    a.join("A", "t1", "alpha");

    assert!(a.session.is_terminated());
    assert!(a.drain().is_empty());
    assert!(app.registry.is_empty());
}
