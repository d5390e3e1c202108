mod common;

use blogicum::form::PostInput;
use blogicum::post::{ImageChange, Posts};
use chrono::{Duration, Utc};
use common::{create_category, create_post, create_user, TestEnv};

fn titles(page: &blogicum::paginator::Page<blogicum::post::PostForTemplate>) -> Vec<String> {
    page.items.iter().map(|p| p.title.to_owned()).collect()
}

#[actix_rt::test]
async fn test_unpublished_category_hides_posts() {
    let env = TestEnv::new().await;
    let author = create_user(&env.db, "ann", false).await;
    let travel = create_category(&env.db, "travel", true).await;
    let hidden = create_category(&env.db, "hidden", false).await;

    create_post(&env.db, &author, "Visible", Some(&travel), true, -Duration::hours(1)).await;
    create_post(&env.db, &author, "Hidden", Some(&hidden), true, -Duration::hours(1)).await;

    let posts = Posts::new(&env.db);
    let home = posts.public_page(Utc::now(), 1).await.unwrap();
    assert_eq!(titles(&home), vec!["Visible"]);

    let category = posts.category_page(&hidden, Utc::now(), 1).await.unwrap();
    assert!(category.items.is_empty());

    let profile = posts.profile_page(&author, false, Utc::now(), 1).await.unwrap();
    assert_eq!(titles(&profile), vec!["Visible"]);
}

#[actix_rt::test]
async fn test_public_listing_gates() {
    let env = TestEnv::new().await;
    let author = create_user(&env.db, "ann", false).await;
    let travel = create_category(&env.db, "travel", true).await;

    create_post(&env.db, &author, "Due", Some(&travel), true, -Duration::hours(2)).await;
    create_post(&env.db, &author, "Draft", Some(&travel), false, -Duration::hours(2)).await;
    create_post(&env.db, &author, "Future", Some(&travel), true, Duration::hours(2)).await;
    create_post(&env.db, &author, "Loose", None, true, -Duration::hours(1)).await;

    let home = Posts::new(&env.db).public_page(Utc::now(), 1).await.unwrap();
    // Newest publication date first.
    assert_eq!(titles(&home), vec!["Loose", "Due"]);
    assert_eq!(home.paginator.item_count, 2);
}

#[actix_rt::test]
async fn test_owner_profile_shows_everything() {
    let env = TestEnv::new().await;
    let author = create_user(&env.db, "ann", false).await;
    let hidden = create_category(&env.db, "hidden", false).await;

    create_post(&env.db, &author, "Draft", None, false, -Duration::hours(1)).await;
    create_post(&env.db, &author, "Future", None, true, Duration::days(1)).await;
    create_post(&env.db, &author, "Hidden", Some(&hidden), true, -Duration::hours(1)).await;

    let posts = Posts::new(&env.db);
    let own = posts.profile_page(&author, true, Utc::now(), 1).await.unwrap();
    assert_eq!(own.items.len(), 3);

    let public = posts.profile_page(&author, false, Utc::now(), 1).await.unwrap();
    assert!(public.items.is_empty());
}

#[actix_rt::test]
async fn test_author_sees_own_draft() {
    let env = TestEnv::new().await;
    let author = create_user(&env.db, "ann", false).await;
    let reader = create_user(&env.db, "bob", false).await;
    let draft = create_post(&env.db, &author, "Draft", None, false, Duration::days(2)).await;

    let post = Posts::new(&env.db)
        .find_for_template(draft.id)
        .await
        .unwrap()
        .unwrap();

    assert!(post.is_visible_to(Some(author.id), Utc::now()));
    assert!(!post.is_visible_to(Some(reader.id), Utc::now()));
    assert!(!post.is_visible_to(None, Utc::now()));
}

#[actix_rt::test]
async fn test_is_scheduled_follows_every_save() {
    let env = TestEnv::new().await;
    let author = create_user(&env.db, "ann", false).await;
    let posts = Posts::new(&env.db);

    let future = create_post(&env.db, &author, "Later", None, true, Duration::hours(3)).await;
    assert!(!future.is_scheduled);

    let due = create_post(&env.db, &author, "Now", None, true, -Duration::hours(3)).await;
    assert!(due.is_scheduled);

    let draft = create_post(&env.db, &author, "Draft", None, false, -Duration::hours(3)).await;
    assert!(!draft.is_scheduled);

    let now = Utc::now();
    let input = PostInput {
        title: "Later".to_owned(),
        text: "moved into the past".to_owned(),
        pub_date: now - Duration::minutes(5),
        category_id: None,
        location_id: None,
        is_published: true,
    };
    let updated = posts
        .update(future, input.clone(), ImageChange::Keep, now)
        .await
        .unwrap();
    assert!(updated.is_scheduled);

    let unpublished = posts
        .update(
            updated,
            PostInput {
                is_published: false,
                ..input
            },
            ImageChange::Keep,
            now,
        )
        .await
        .unwrap();
    assert!(!unpublished.is_scheduled);

    let stored = posts.find(unpublished.id).await.unwrap().unwrap();
    assert_eq!(
        stored.is_scheduled,
        stored.is_published && stored.pub_date <= Utc::now()
    );
}

#[actix_rt::test]
async fn test_pages_of_ten() {
    let env = TestEnv::new().await;
    let author = create_user(&env.db, "ann", false).await;
    for i in 0..23 {
        create_post(
            &env.db,
            &author,
            &format!("Post {}", i),
            None,
            true,
            -Duration::hours(i + 1),
        )
        .await;
    }

    let posts = Posts::new(&env.db);
    let first = posts.public_page(Utc::now(), 1).await.unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].title, "Post 0");
    assert_eq!(first.paginator.page_count, 3);

    // Past the end falls back to the last page.
    let last = posts.public_page(Utc::now(), 99).await.unwrap();
    assert_eq!(last.paginator.this_page, 3);
    assert_eq!(titles(&last), vec!["Post 20", "Post 21", "Post 22"]);
}
