use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::ApiError;

/// 用户角色，权限从高到低
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Editor,
    Author,
    Contributor,
    Subscriber,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Editor => "editor",
            Self::Author => "author",
            Self::Contributor => "contributor",
            Self::Subscriber => "subscriber",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "administrator" => Some(Self::Administrator),
            "editor" => Some(Self::Editor),
            "author" => Some(Self::Author),
            "contributor" => Some(Self::Contributor),
            "subscriber" => Some(Self::Subscriber),
            _ => None,
        }
    }
}

/// 角色校验：先检查是否登录（401），再检查角色（403），顺序不可颠倒
pub fn require_role(identity: Option<&Identity>, allowed: &[Role]) -> Result<(), ApiError> {
    let identity = identity.ok_or(ApiError::Unauthenticated)?;
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// 管理员和编辑可以操作任意文章，作者和投稿者只能操作自己的
pub fn can_edit_post(identity: &Identity, author_id: i64) -> bool {
    match identity.role {
        Role::Administrator | Role::Editor => true,
        Role::Author | Role::Contributor => identity.user_id == author_id,
        Role::Subscriber => false,
    }
}

pub fn can_delete_post(identity: &Identity, author_id: i64) -> bool {
    can_edit_post(identity, author_id)
}

/// 发布权限独立于编辑权限：投稿者即使是自己的文章也不能发布
pub fn can_publish(role: Role) -> bool {
    matches!(role, Role::Administrator | Role::Editor | Role::Author)
}

/// 邮箱、IP等隐私字段只对管理员和编辑可见
pub fn can_view_private_fields(role: Role) -> bool {
    matches!(role, Role::Administrator | Role::Editor)
}

pub fn can_moderate_comments(role: Role) -> bool {
    matches!(role, Role::Administrator | Role::Editor)
}

/// 站点管理权限（用户管理、站点设置）
pub fn can_manage_site(role: Role) -> bool {
    matches!(role, Role::Administrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: i64, role: Role) -> Identity {
        Identity {
            user_id,
            username: "tester".into(),
            email: "tester@example.com".into(),
            role,
        }
    }

    #[test]
    fn require_role_checks_presence_before_role() {
        // 未登录必须是401，不是403
        let err = require_role(None, &[Role::Administrator]).unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));

        let id = identity(1, Role::Subscriber);
        let err = require_role(Some(&id), &[Role::Administrator]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));

        let id = identity(1, Role::Editor);
        assert!(require_role(Some(&id), &[Role::Administrator, Role::Editor]).is_ok());
    }

    #[test]
    fn ownership_rules() {
        assert!(can_edit_post(&identity(5, Role::Administrator), 9));
        assert!(can_edit_post(&identity(5, Role::Editor), 9));
        assert!(can_edit_post(&identity(5, Role::Author), 5));
        assert!(!can_edit_post(&identity(5, Role::Author), 9));
        assert!(can_edit_post(&identity(5, Role::Contributor), 5));
        assert!(!can_edit_post(&identity(5, Role::Contributor), 9));
        assert!(!can_edit_post(&identity(5, Role::Subscriber), 5));
    }

    #[test]
    fn publish_gating() {
        assert!(can_publish(Role::Administrator));
        assert!(can_publish(Role::Editor));
        assert!(can_publish(Role::Author));
        assert!(!can_publish(Role::Contributor));
        assert!(!can_publish(Role::Subscriber));
    }

    #[test]
    fn role_string_round_trip() {
        for role in [
            Role::Administrator,
            Role::Editor,
            Role::Author,
            Role::Contributor,
            Role::Subscriber,
        ] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("superuser"), None);
    }
}
