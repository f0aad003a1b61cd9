use sqlx::PgPool;

use cms_backend::auth::permissions::Role;
use cms_backend::database::repositories::{
    comments::{CommentRepository, NewComment},
    posts::{NewPost, PostRepository},
    terms::TermRepository,
    users::UserRepository,
};

async fn seed_user(pool: &PgPool, username: &str) -> i64 {
    let user = UserRepository::create(
        pool,
        username,
        &format!("{}@example.com", username),
        "$2b$12$fixture",
        username,
        "author",
    )
    .await
    .unwrap();
    user.id
}

async fn seed_post(pool: &PgPool, author_id: i64, slug: &str) -> i64 {
    let post = PostRepository::insert(
        pool,
        NewPost {
            post_type: "post".to_string(),
            title: slug.to_string(),
            content: None,
            excerpt: None,
            slug: slug.to_string(),
            status: "publish".to_string(),
            author_id,
            parent_id: 0,
            featured_media_id: None,
            featured_image_url: None,
            comment_status: "open".to_string(),
        },
    )
    .await
    .unwrap();
    post.id
}

async fn category_count(pool: &PgPool, id: i64) -> i64 {
    TermRepository::find_category(pool, id)
        .await
        .unwrap()
        .unwrap()
        .count
}

#[sqlx::test]
async fn first_registered_user_bootstraps_administrator(pool: PgPool) {
    assert_eq!(
        UserRepository::registration_role(&pool).await.unwrap(),
        Role::Administrator
    );

    seed_user(&pool, "founder").await;

    // 之后的注册者一律回到订阅者
    assert_eq!(
        UserRepository::registration_role(&pool).await.unwrap(),
        Role::Subscriber
    );
    seed_user(&pool, "latecomer").await;
    assert_eq!(
        UserRepository::registration_role(&pool).await.unwrap(),
        Role::Subscriber
    );
}

#[sqlx::test]
async fn slug_collisions_get_numeric_suffixes(pool: PgPool) {
    let author = seed_user(&pool, "writer").await;

    assert_eq!(
        PostRepository::unique_slug(&pool, "hello-world", None)
            .await
            .unwrap(),
        "hello-world"
    );

    seed_post(&pool, author, "hello-world").await;
    assert_eq!(
        PostRepository::unique_slug(&pool, "hello-world", None)
            .await
            .unwrap(),
        "hello-world-1"
    );

    seed_post(&pool, author, "hello-world-1").await;
    assert_eq!(
        PostRepository::unique_slug(&pool, "hello-world", None)
            .await
            .unwrap(),
        "hello-world-2"
    );
}

#[sqlx::test]
async fn slug_check_excludes_the_post_being_updated(pool: PgPool) {
    let author = seed_user(&pool, "writer").await;
    let id = seed_post(&pool, author, "hello-world").await;

    // 自己占用的slug在更新时不算冲突
    assert_eq!(
        PostRepository::unique_slug(&pool, "hello-world", Some(id))
            .await
            .unwrap(),
        "hello-world"
    );
}

#[sqlx::test]
async fn category_counts_track_attachment_replacement(pool: PgPool) {
    let author = seed_user(&pool, "writer").await;
    let post = seed_post(&pool, author, "counted").await;

    // id=1为迁移种下的默认分类
    let second = TermRepository::create_category(&pool, "技术", "tech", None, 0)
        .await
        .unwrap();
    let third = TermRepository::create_category(&pool, "生活", "life", None, 0)
        .await
        .unwrap();

    TermRepository::set_post_categories(&pool, post, &[1, second.id])
        .await
        .unwrap();
    TermRepository::set_post_categories(&pool, post, &[second.id, third.id])
        .await
        .unwrap();

    assert_eq!(category_count(&pool, 1).await, 0);
    assert_eq!(category_count(&pool, second.id).await, 1);
    assert_eq!(category_count(&pool, third.id).await, 1);

    let attached = TermRepository::category_ids_of_post(&pool, post).await.unwrap();
    assert_eq!(attached, vec![second.id, third.id]);
}

#[sqlx::test]
async fn comment_delete_removes_whole_reply_subtree(pool: PgPool) {
    let author = seed_user(&pool, "writer").await;
    let post = seed_post(&pool, author, "threaded").await;

    let comment = |parent_id: i64| NewComment {
        post_id: post,
        parent_id,
        author_name: "游客".to_string(),
        author_email: None,
        author_url: None,
        author_ip: None,
        content: "回复".to_string(),
        status: "approved".to_string(),
        user_id: None,
    };
    let top = CommentRepository::insert(&pool, comment(0)).await.unwrap();
    let reply = CommentRepository::insert(&pool, comment(top.id)).await.unwrap();
    let nested = CommentRepository::insert(&pool, comment(reply.id)).await.unwrap();
    let unrelated = CommentRepository::insert(&pool, comment(0)).await.unwrap();

    let removed = CommentRepository::delete(&pool, top.id).await.unwrap();
    assert_eq!(removed, 3);

    // 孙辈回复不能留下悬空parent_id
    assert!(CommentRepository::find_by_id(&pool, nested.id)
        .await
        .unwrap()
        .is_none());
    assert!(CommentRepository::find_by_id(&pool, unrelated.id)
        .await
        .unwrap()
        .is_some());
}
