use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::database::entities::{
    comment::Comment,
    link::{Link, LinkCategory},
    media::Media,
    moment::Moment,
    post::Post,
    term::{Category, Tag},
    user::User,
};

pub mod pagination;

/// 去掉base URL的尾部斜杠，所有_links都在它之上拼接
pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Gravatar摘要：邮箱去首尾空白、转小写后取MD5十六进制
/// 归一化步骤必须跨语言逐字节一致
pub fn gravatar_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.trim().to_lowercase().as_bytes()))
}

/// 三档固定尺寸的头像URL；有显式头像时直接复用
pub fn avatar_urls(explicit: Option<&str>, email: Option<&str>) -> Value {
    match explicit.filter(|u| !u.is_empty()) {
        Some(url) => json!({ "24": url, "48": url, "96": url }),
        None => {
            let hash = gravatar_hash(email.unwrap_or(""));
            let at = |size: u32| {
                format!("https://www.gravatar.com/avatar/{}?s={}&d=mm", hash, size)
            };
            json!({ "24": at(24), "48": at(48), "96": at(96) })
        }
    }
}

fn wp_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[derive(Debug, Serialize)]
pub struct RenderedText {
    pub rendered: String,
}

#[derive(Debug, Serialize)]
pub struct ProtectedText {
    pub rendered: String,
    pub protected: bool,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub date: String,
    pub date_gmt: String,
    pub modified: String,
    pub modified_gmt: String,
    pub slug: String,
    pub status: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub link: String,
    pub title: RenderedText,
    pub content: ProtectedText,
    pub excerpt: ProtectedText,
    pub author: i64,
    pub featured_media: i64,
    pub featured_image_url: Option<String>,
    pub comment_status: String,
    pub comment_count: i64,
    pub view_count: i64,
    pub parent: i64,
    pub categories: Vec<i64>,
    pub tags: Vec<i64>,
    pub _links: Value,
}

/// 文章/页面 → WordPress文章JSON
/// 对外日期取published_at，未发布的草稿回落到created_at
pub fn format_post(post: &Post, category_ids: Vec<i64>, tag_ids: Vec<i64>, base_url: &str) -> PostView {
    let base = normalize_base_url(base_url);
    let public_date = post.published_at.unwrap_or(post.created_at);
    let rest = match post.post_type.as_str() {
        "page" => "pages",
        _ => "posts",
    };

    let links = json!({
        "self": [{ "href": format!("{}/wp-json/wp/v2/{}/{}", base, rest, post.id) }],
        "collection": [{ "href": format!("{}/wp-json/wp/v2/{}", base, rest) }],
        "author": [{
            "embeddable": true,
            "href": format!("{}/wp-json/wp/v2/users/{}", base, post.author_id)
        }],
        "replies": [{
            "embeddable": true,
            "href": format!("{}/wp-json/wp/v2/comments?post={}", base, post.id)
        }],
        "wp:attachment": [{ "href": format!("{}/wp-json/wp/v2/media?parent={}", base, post.id) }],
        "wp:term": [
            {
                "taxonomy": "category",
                "embeddable": true,
                "href": format!("{}/wp-json/wp/v2/categories?post={}", base, post.id)
            },
            {
                "taxonomy": "post_tag",
                "embeddable": true,
                "href": format!("{}/wp-json/wp/v2/tags?post={}", base, post.id)
            }
        ]
    });

    PostView {
        id: post.id,
        date: wp_datetime(&public_date),
        date_gmt: wp_datetime(&public_date),
        modified: wp_datetime(&post.updated_at),
        modified_gmt: wp_datetime(&post.updated_at),
        slug: post.slug.clone(),
        status: post.status.clone(),
        post_type: post.post_type.clone(),
        link: format!("{}/{}", base, post.slug),
        title: RenderedText {
            rendered: post.title.clone(),
        },
        content: ProtectedText {
            rendered: post.content.clone().unwrap_or_default(),
            protected: post.status == "private",
        },
        excerpt: ProtectedText {
            rendered: post.excerpt.clone().unwrap_or_default(),
            protected: false,
        },
        author: post.author_id,
        featured_media: post.featured_media_id.unwrap_or(0),
        featured_image_url: post.featured_image_url.clone(),
        comment_status: post.comment_status.clone(),
        comment_count: post.comment_count,
        view_count: post.view_count,
        parent: post.parent_id,
        categories: category_ids,
        tags: tag_ids,
        _links: links,
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub link: String,
    pub slug: String,
    pub avatar_urls: Value,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub _links: Value,
}

/// 用户 → WordPress用户JSON
/// 邮箱、用户名、注册时间只在管理视角或本人自查时出现，
/// 每次请求重新判定，绝不把视角烘进缓存
pub fn format_user(user: &User, base_url: &str, can_view_private: bool) -> UserView {
    let base = normalize_base_url(base_url);

    let links = json!({
        "self": [{ "href": format!("{}/wp-json/wp/v2/users/{}", base, user.id) }],
        "collection": [{ "href": format!("{}/wp-json/wp/v2/users", base) }],
    });

    UserView {
        id: user.id,
        name: user.display_name.clone(),
        description: user.bio.clone().unwrap_or_default(),
        link: format!("{}/author/{}", base, user.username),
        slug: user.username.clone(),
        avatar_urls: avatar_urls(user.avatar_url.as_deref(), Some(&user.email)),
        roles: vec![user.role.clone()],
        username: can_view_private.then(|| user.username.clone()),
        email: can_view_private.then(|| user.email.clone()),
        registered_date: can_view_private.then(|| wp_datetime(&user.registered_at)),
        status: can_view_private.then(|| user.status.clone()),
        _links: links,
    }
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post: i64,
    pub parent: i64,
    pub author: i64,
    pub author_name: String,
    pub author_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_ip: Option<String>,
    pub date: String,
    pub content: RenderedText,
    pub status: String,
    pub avatar_urls: Value,
    pub _links: Value,
}

/// 评论 → WordPress评论JSON，邮箱和IP只对管理视角输出
pub fn format_comment(comment: &Comment, base_url: &str, is_admin: bool) -> CommentView {
    let base = normalize_base_url(base_url);

    let links = json!({
        "self": [{ "href": format!("{}/wp-json/wp/v2/comments/{}", base, comment.id) }],
        "collection": [{ "href": format!("{}/wp-json/wp/v2/comments", base) }],
        "up": [{
            "embeddable": true,
            "href": format!("{}/wp-json/wp/v2/posts/{}", base, comment.post_id)
        }],
    });

    CommentView {
        id: comment.id,
        post: comment.post_id,
        parent: comment.parent_id,
        author: comment.user_id.unwrap_or(0),
        author_name: comment.author_name.clone(),
        author_url: comment.author_url.clone().unwrap_or_default(),
        author_email: if is_admin {
            comment.author_email.clone()
        } else {
            None
        },
        author_ip: if is_admin {
            comment.author_ip.clone()
        } else {
            None
        },
        date: wp_datetime(&comment.created_at),
        content: RenderedText {
            rendered: comment.content.clone(),
        },
        status: comment.status.clone(),
        avatar_urls: avatar_urls(None, comment.author_email.as_deref()),
        _links: links,
    }
}

#[derive(Debug, Serialize)]
pub struct TermView {
    pub id: i64,
    pub count: i64,
    pub description: String,
    pub link: String,
    pub name: String,
    pub slug: String,
    pub taxonomy: String,
    pub parent: i64,
    pub _links: Value,
}

fn term_links(base: &str, rest: &str, id: i64) -> Value {
    json!({
        "self": [{ "href": format!("{}/wp-json/wp/v2/{}/{}", base, rest, id) }],
        "collection": [{ "href": format!("{}/wp-json/wp/v2/{}", base, rest) }],
        "wp:post_type": [{ "href": format!("{}/wp-json/wp/v2/posts?{}={}", base,
            if rest == "categories" { "categories" } else { "tags" }, id) }],
    })
}

pub fn format_category(category: &Category, base_url: &str) -> TermView {
    let base = normalize_base_url(base_url);
    TermView {
        id: category.id,
        count: category.count,
        description: category.description.clone().unwrap_or_default(),
        link: format!("{}/category/{}", base, category.slug),
        name: category.name.clone(),
        slug: category.slug.clone(),
        taxonomy: "category".to_string(),
        parent: category.parent_id,
        _links: term_links(&base, "categories", category.id),
    }
}

pub fn format_tag(tag: &Tag, base_url: &str) -> TermView {
    let base = normalize_base_url(base_url);
    TermView {
        id: tag.id,
        count: tag.count,
        description: tag.description.clone().unwrap_or_default(),
        link: format!("{}/tag/{}", base, tag.slug),
        name: tag.name.clone(),
        slug: tag.slug.clone(),
        taxonomy: "post_tag".to_string(),
        parent: 0,
        _links: term_links(&base, "tags", tag.id),
    }
}

#[derive(Debug, Serialize)]
pub struct MediaDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    pub file: String,
    pub filesize: i64,
}

#[derive(Debug, Serialize)]
pub struct MediaView {
    pub id: i64,
    pub date: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub link: String,
    pub title: RenderedText,
    pub author: i64,
    pub mime_type: String,
    pub media_type: String,
    pub media_details: MediaDetails,
    pub source_url: String,
    pub alt_text: String,
    pub caption: RenderedText,
    pub description: RenderedText,
    pub _links: Value,
}

pub fn format_media(media: &Media, base_url: &str) -> MediaView {
    let base = normalize_base_url(base_url);

    let links = json!({
        "self": [{ "href": format!("{}/wp-json/wp/v2/media/{}", base, media.id) }],
        "collection": [{ "href": format!("{}/wp-json/wp/v2/media", base) }],
        "author": [{
            "embeddable": true,
            "href": format!("{}/wp-json/wp/v2/users/{}", base, media.author_id)
        }],
    });

    MediaView {
        id: media.id,
        date: wp_datetime(&media.created_at),
        entity_type: "attachment".to_string(),
        link: format!("{}/media/{}", base, media.id),
        title: RenderedText {
            rendered: media.title.clone(),
        },
        author: media.author_id,
        mime_type: media.mime_type.clone(),
        media_type: media.file_type.clone(),
        media_details: MediaDetails {
            width: media.width,
            height: media.height,
            file: media.filename.clone(),
            filesize: media.file_size,
        },
        source_url: media.url.clone(),
        alt_text: media.alt_text.clone().unwrap_or_default(),
        caption: RenderedText {
            rendered: media.caption.clone().unwrap_or_default(),
        },
        description: RenderedText {
            rendered: media.description.clone().unwrap_or_default(),
        },
        _links: links,
    }
}

#[derive(Debug, Serialize)]
pub struct LinkView {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: String,
    pub category: i64,
    pub visible: String,
    pub sort_order: i32,
    pub target: String,
    pub _links: Value,
}

pub fn format_link(link: &Link, base_url: &str) -> LinkView {
    let base = normalize_base_url(base_url);
    LinkView {
        id: link.id,
        name: link.name.clone(),
        url: link.url.clone(),
        description: link.description.clone().unwrap_or_default(),
        category: link.category_id,
        visible: link.visible.clone(),
        sort_order: link.sort_order,
        target: link.target.clone(),
        _links: json!({
            "self": [{ "href": format!("{}/wp-json/wp/v2/links/{}", base, link.id) }],
            "collection": [{ "href": format!("{}/wp-json/wp/v2/links", base) }],
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct LinkCategoryView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub count: i64,
    pub _links: Value,
}

pub fn format_link_category(category: &LinkCategory, base_url: &str) -> LinkCategoryView {
    let base = normalize_base_url(base_url);
    LinkCategoryView {
        id: category.id,
        name: category.name.clone(),
        description: category.description.clone().unwrap_or_default(),
        count: category.count,
        _links: json!({
            "self": [{ "href": format!("{}/wp-json/wp/v2/link-categories/{}", base, category.id) }],
            "collection": [{ "href": format!("{}/wp-json/wp/v2/link-categories", base) }],
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct MomentView {
    pub id: i64,
    pub content: String,
    pub author: i64,
    pub status: String,
    pub media_urls: Vec<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub date: String,
    pub modified: String,
    pub _links: Value,
}

pub fn format_moment(moment: &Moment, base_url: &str) -> MomentView {
    let base = normalize_base_url(base_url);
    MomentView {
        id: moment.id,
        content: moment.content.clone(),
        author: moment.author_id,
        status: moment.status.clone(),
        media_urls: moment.media_url_list(),
        view_count: moment.view_count,
        like_count: moment.like_count,
        comment_count: moment.comment_count,
        date: wp_datetime(&moment.created_at),
        modified: wp_datetime(&moment.updated_at),
        _links: json!({
            "self": [{ "href": format!("{}/wp-json/wp/v2/moments/{}", base, moment.id) }],
            "collection": [{ "href": format!("{}/wp-json/wp/v2/moments", base) }],
            "author": [{
                "embeddable": true,
                "href": format!("{}/wp-json/wp/v2/users/{}", base, moment.author_id)
            }],
        }),
    }
}

/// 公开的设置视图剔除秘密类键；管理视图原样返回
pub fn format_settings(
    values: &std::collections::HashMap<String, String>,
    admin: bool,
) -> std::collections::HashMap<String, String> {
    values
        .iter()
        .filter(|(key, _)| {
            admin || !(key.ends_with("_secret") || key.ends_with("_key"))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user(can_see: Option<&str>) -> User {
        User {
            id: 7,
            username: "alice".into(),
            email: can_see.unwrap_or(" User@Example.COM ").into(),
            password_hash: "$2b$12$hash".into(),
            display_name: "Alice".into(),
            role: "author".into(),
            status: "active".into(),
            registered_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_login: None,
            avatar_url: None,
            bio: None,
        }
    }

    #[test]
    fn gravatar_normalization_is_deterministic() {
        // 大小写和首尾空白不影响摘要
        assert_eq!(
            gravatar_hash(" User@Example.COM "),
            gravatar_hash("user@example.com")
        );
        // MD5十六进制小写，32字符
        let hash = gravatar_hash("user@example.com");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash.to_lowercase());
    }

    #[test]
    fn explicit_avatar_wins() {
        let urls = avatar_urls(Some("https://cdn.example.com/a.png"), Some("x@y.z"));
        assert_eq!(urls["48"], "https://cdn.example.com/a.png");
        let urls = avatar_urls(None, Some("x@y.z"));
        for size in ["24", "48", "96"] {
            assert!(urls[size].as_str().unwrap().contains("gravatar.com"));
            assert!(urls[size].as_str().unwrap().contains(&format!("s={}", size)));
        }
    }

    #[test]
    fn user_redaction_is_idempotent() {
        let user = sample_user(None);
        let a = serde_json::to_value(format_user(&user, "http://b.example/", false)).unwrap();
        let b = serde_json::to_value(format_user(&user, "http://b.example/", false)).unwrap();
        assert_eq!(a, b);
        assert!(a.get("email").is_none());
        assert!(a.get("username").is_none());

        let admin = serde_json::to_value(format_user(&user, "http://b.example/", true)).unwrap();
        assert_eq!(admin["email"], " User@Example.COM ");
        assert_eq!(admin["username"], "alice");
    }

    #[test]
    fn comment_redaction() {
        let comment = Comment {
            id: 3,
            post_id: 1,
            parent_id: 0,
            author_name: "游客".into(),
            author_email: Some("guest@example.com".into()),
            author_url: None,
            author_ip: Some("203.0.113.9".into()),
            content: "不错".into(),
            status: "approved".into(),
            user_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        };
        let public = serde_json::to_value(format_comment(&comment, "http://b.example", false)).unwrap();
        assert!(public.get("author_email").is_none());
        assert!(public.get("author_ip").is_none());

        let admin = serde_json::to_value(format_comment(&comment, "http://b.example", true)).unwrap();
        assert_eq!(admin["author_email"], "guest@example.com");
        assert_eq!(admin["author_ip"], "203.0.113.9");
    }

    #[test]
    fn post_date_falls_back_to_created_at() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let post = Post {
            id: 1,
            post_type: "post".into(),
            title: "草稿".into(),
            content: None,
            excerpt: None,
            slug: "draft".into(),
            status: "draft".into(),
            author_id: 1,
            parent_id: 0,
            featured_media_id: None,
            featured_image_url: None,
            comment_status: "open".into(),
            comment_count: 0,
            view_count: 0,
            created_at: created,
            updated_at: created,
            published_at: None,
        };
        let view = format_post(&post, vec![], vec![], "http://b.example/");
        assert_eq!(view.date, "2024-03-01T08:00:00");

        let published = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();
        let post = Post {
            published_at: Some(published),
            status: "publish".into(),
            ..post
        };
        let view = format_post(&post, vec![1, 2], vec![3], "http://b.example/");
        assert_eq!(view.date, "2024-04-01T09:00:00");
        assert_eq!(view.categories, vec![1, 2]);
        assert_eq!(view.tags, vec![3]);
    }

    #[test]
    fn base_url_trailing_slash_normalized() {
        let post_links = |base: &str| {
            let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
            let post = Post {
                id: 5,
                post_type: "post".into(),
                title: "t".into(),
                content: None,
                excerpt: None,
                slug: "t".into(),
                status: "publish".into(),
                author_id: 1,
                parent_id: 0,
                featured_media_id: None,
                featured_image_url: None,
                comment_status: "open".into(),
                comment_count: 0,
                view_count: 0,
                created_at: created,
                updated_at: created,
                published_at: Some(created),
            };
            serde_json::to_value(format_post(&post, vec![], vec![], base)._links).unwrap()
        };
        assert_eq!(post_links("http://b.example/"), post_links("http://b.example"));
        let links = post_links("http://b.example/");
        assert_eq!(
            links["self"][0]["href"],
            "http://b.example/wp-json/wp/v2/posts/5"
        );
    }

    #[test]
    fn settings_redaction() {
        let mut values = std::collections::HashMap::new();
        values.insert("site_title".to_string(), "Blog".to_string());
        values.insert("webhook_secret".to_string(), "shh".to_string());
        values.insert("ai_api_key".to_string(), "k".to_string());

        let public = format_settings(&values, false);
        assert!(public.contains_key("site_title"));
        assert!(!public.contains_key("webhook_secret"));
        assert!(!public.contains_key("ai_api_key"));

        let admin = format_settings(&values, true);
        assert_eq!(admin.len(), 3);
    }
}
