mod common;

use blogicum::comment::{recount, Comments};
use blogicum::post::Posts;
use blogicum::user::Users;
use chrono::{Duration, Utc};
use common::{create_post, create_user, TestEnv};
use sea_orm::TransactionTrait;

async fn comment_count(env: &TestEnv, post_id: i32) -> i32 {
    Posts::new(&env.db)
        .find(post_id)
        .await
        .unwrap()
        .unwrap()
        .comment_count
}

#[actix_rt::test]
async fn test_comment_count_follows_create_and_delete() {
    let env = TestEnv::new().await;
    let a = create_user(&env.db, "ann", false).await;
    let b = create_user(&env.db, "bob", false).await;
    let post = create_post(&env.db, &b, "Bob's post", None, true, -Duration::hours(1)).await;
    assert_eq!(post.comment_count, 0);

    let txn = env.db.begin().await.unwrap();
    let comment = Comments::new(&txn)
        .create(post.id, a.id, "Nice!".to_owned(), Utc::now())
        .await
        .unwrap();
    txn.commit().await.unwrap();
    assert_eq!(comment_count(&env, post.id).await, 1);

    let txn = env.db.begin().await.unwrap();
    Comments::new(&txn).delete(comment).await.unwrap();
    txn.commit().await.unwrap();
    assert_eq!(comment_count(&env, post.id).await, 0);
}

#[actix_rt::test]
async fn test_rolled_back_comment_leaves_count_alone() {
    let env = TestEnv::new().await;
    let a = create_user(&env.db, "ann", false).await;
    let post = create_post(&env.db, &a, "Post", None, true, -Duration::hours(1)).await;

    let txn = env.db.begin().await.unwrap();
    Comments::new(&txn)
        .create(post.id, a.id, "draft".to_owned(), Utc::now())
        .await
        .unwrap();
    txn.rollback().await.unwrap();

    assert_eq!(comment_count(&env, post.id).await, 0);
    assert!(Comments::new(&env.db).for_post(post.id).await.unwrap().is_empty());
}

#[actix_rt::test]
async fn test_recount_repairs_drift() {
    let env = TestEnv::new().await;
    let a = create_user(&env.db, "ann", false).await;
    let post = create_post(&env.db, &a, "Post", None, true, -Duration::hours(1)).await;
    let comments = Comments::new(&env.db);
    for text in ["one", "two", "three"] {
        comments
            .create(post.id, a.id, text.to_owned(), Utc::now())
            .await
            .unwrap();
    }

    assert_eq!(recount(&env.db, post.id).await.unwrap(), 3);
    assert_eq!(comment_count(&env, post.id).await, 3);

    let listed = comments.for_post(post.id).await.unwrap();
    assert_eq!(
        listed.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );
    assert!(listed.iter().all(|c| c.author_name == "ann"));
}

#[actix_rt::test]
async fn test_comment_lookup_is_scoped_to_post() {
    let env = TestEnv::new().await;
    let a = create_user(&env.db, "ann", false).await;
    let first = create_post(&env.db, &a, "First", None, true, -Duration::hours(1)).await;
    let second = create_post(&env.db, &a, "Second", None, true, -Duration::hours(1)).await;
    let comment = Comments::new(&env.db)
        .create(first.id, a.id, "hello".to_owned(), Utc::now())
        .await
        .unwrap();

    let comments = Comments::new(&env.db);
    assert!(comments.find_in_post(first.id, comment.id).await.unwrap().is_some());
    assert!(comments.find_in_post(second.id, comment.id).await.unwrap().is_none());
}

#[actix_rt::test]
async fn test_deleting_a_user_recounts_other_posts() {
    let env = TestEnv::new().await;
    let a = create_user(&env.db, "ann", false).await;
    let b = create_user(&env.db, "bob", false).await;
    let bobs = create_post(&env.db, &b, "Bob's", None, true, -Duration::hours(1)).await;
    let anns = create_post(&env.db, &a, "Ann's", None, true, -Duration::hours(1)).await;

    let comments = Comments::new(&env.db);
    comments.create(bobs.id, a.id, "from ann".to_owned(), Utc::now()).await.unwrap();
    comments.create(bobs.id, b.id, "from bob".to_owned(), Utc::now()).await.unwrap();
    comments.create(anns.id, b.id, "on ann's".to_owned(), Utc::now()).await.unwrap();

    let txn = env.db.begin().await.unwrap();
    Users::new(&txn).delete(a.id).await.unwrap();
    txn.commit().await.unwrap();

    assert_eq!(comment_count(&env, bobs.id).await, 1);
    assert!(Posts::new(&env.db).find(anns.id).await.unwrap().is_none());
    assert!(Users::new(&env.db).find_by_username("ann").await.unwrap().is_none());
}
