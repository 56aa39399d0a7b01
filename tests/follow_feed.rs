mod support;

use support::TestApp;
use yatube::application::{
    follow::{FollowError, SubscribeOutcome, UnsubscribeOutcome},
    pagination::PageNumber,
    posts::PostDraft,
};

#[tokio::test]
async fn subscribe_and_unsubscribe_toggle_the_edge() {
    let app = TestApp::new();
    let reader = app.store.add_user("reader");
    let author = app.store.add_user("author");

    let outcome = app.follows.subscribe(&reader, "author").await.expect("subscribe");
    assert_eq!(outcome, SubscribeOutcome::Created);
    assert!(app.follows.is_following(reader.id, author.id).await.expect("lookup"));

    let outcome = app
        .follows
        .unsubscribe(&reader, "author")
        .await
        .expect("unsubscribe");
    assert_eq!(outcome, UnsubscribeOutcome::Removed);
    assert!(!app.follows.is_following(reader.id, author.id).await.expect("lookup"));
}

#[tokio::test]
async fn following_yourself_creates_no_edge() {
    let app = TestApp::new();
    let narcissus = app.store.add_user("narcissus");

    let outcome = app
        .follows
        .subscribe(&narcissus, "narcissus")
        .await
        .expect("subscribe");

    assert_eq!(outcome, SubscribeOutcome::SelfFollow);
    assert!(app.store.follow_edges().is_empty());
    assert!(
        !app.follows
            .is_following(narcissus.id, narcissus.id)
            .await
            .expect("lookup")
    );
}

#[tokio::test]
async fn repeated_subscribe_keeps_a_single_edge() {
    let app = TestApp::new();
    let reader = app.store.add_user("reader");
    let author = app.store.add_user("author");

    app.follows.subscribe(&reader, "author").await.expect("first");
    let second = app.follows.subscribe(&reader, "author").await.expect("second");

    assert_eq!(second, SubscribeOutcome::AlreadyFollowing);
    assert_eq!(app.store.follow_edges(), vec![(reader.id, author.id)]);
}

#[tokio::test]
async fn unsubscribing_when_not_following_is_a_no_op() {
    let app = TestApp::new();
    let reader = app.store.add_user("reader");
    app.store.add_user("author");

    let outcome = app
        .follows
        .unsubscribe(&reader, "author")
        .await
        .expect("unsubscribe");

    assert_eq!(outcome, UnsubscribeOutcome::NotFollowing);
}

#[tokio::test]
async fn following_an_unknown_author_fails() {
    let app = TestApp::new();
    let reader = app.store.add_user("reader");

    let err = app
        .follows
        .subscribe(&reader, "ghost")
        .await
        .expect_err("unknown author");

    assert!(matches!(err, FollowError::UnknownAuthor(name) if name == "ghost"));
}

#[tokio::test]
async fn feed_contains_only_followed_authors_newest_first() {
    let app = TestApp::new();
    let reader = app.store.add_user("reader");
    let tolstoy = app.store.add_user("tolstoy");
    let chekhov = app.store.add_user("chekhov");
    let stranger = app.store.add_user("stranger");

    app.store.add_post(&tolstoy, "war");
    app.store.add_post(&stranger, "noise");
    app.store.add_post(&chekhov, "cherry orchard");
    app.store.add_post(&tolstoy, "peace");

    app.follows.subscribe(&reader, "tolstoy").await.expect("follow");
    app.follows.subscribe(&reader, "chekhov").await.expect("follow");

    let page = app
        .feed
        .get_feed(reader.id, PageNumber::First)
        .await
        .expect("feed");
    let texts: Vec<&str> = page.items.iter().map(|post| post.text.as_str()).collect();

    assert_eq!(texts, ["peace", "cherry orchard", "war"]);
    assert!(page.items.iter().all(|post| post.author_id != stranger.id));
}

#[tokio::test]
async fn feed_of_someone_following_nobody_is_empty() {
    let app = TestApp::new();
    let loner = app.store.add_user("loner");
    let author = app.store.add_user("author");
    app.store.add_post(&author, "hello");

    let page = app
        .feed
        .get_feed(loner.id, PageNumber::Exact(3))
        .await
        .expect("feed");

    assert!(page.items.is_empty());
    assert_eq!(page.number, 1);
    assert_eq!(page.num_pages, 1);
}

#[tokio::test]
async fn thirteen_posts_split_into_ten_and_three() {
    let app = TestApp::new();
    let reader = app.store.add_user("reader");
    let author = app.store.add_user("author");
    for n in 0..13 {
        app.store.add_post(&author, &format!("post {n}"));
    }
    app.follows.subscribe(&reader, "author").await.expect("follow");

    let first = app
        .feed
        .get_feed(reader.id, PageNumber::parse(None))
        .await
        .expect("page 1");
    let second = app
        .feed
        .get_feed(reader.id, PageNumber::parse(Some("2")))
        .await
        .expect("page 2");
    let beyond = app
        .feed
        .get_feed(reader.id, PageNumber::parse(Some("99")))
        .await
        .expect("page 99");

    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].text, "post 12");
    assert_eq!(second.items.len(), 3);
    assert_eq!(second.items[2].text, "post 0");
    assert_eq!(beyond.number, 2);
    assert_eq!(beyond.items.len(), 3);

    let index = app.feed.index(PageNumber::parse(Some("abc"))).await.expect("index");
    assert_eq!(index.number, 1);
    assert_eq!(index.num_pages, 2);
}

#[tokio::test]
async fn subscribed_reader_sees_new_post_first() {
    let app = TestApp::new();
    let writer = app.store.add_user("writer");
    let reader = app.store.add_user("reader");
    app.store.add_post(&writer, "older");

    app.posts
        .create_post(
            &writer,
            PostDraft {
                text: "SubscribePost".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("create post");
    app.follows.subscribe(&reader, "writer").await.expect("follow");

    let feed = app
        .feed
        .get_feed(reader.id, PageNumber::First)
        .await
        .expect("feed");

    assert_eq!(feed.items[0].text, "SubscribePost");
    assert!(!app.follows.is_following(writer.id, reader.id).await.expect("lookup"));
}
