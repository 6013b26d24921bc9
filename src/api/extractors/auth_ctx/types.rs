/*
 * Responsibility
 * - Handler から見える「認証コンテキスト」の型
 * - gate が生成して request extensions に格納し、以後は読み取り専用
 *
 * Notes
 * - session 取得や policy 判定は middleware/services 側の責務
 * - request ごとに 1 つ。グローバルな "current user" は存在しない
 */
use std::sync::Arc;

use crate::services::auth::SessionRecord;

/// Per-request authentication context.
///
/// - `session` is `None` on public routes and on optional routes without a session
/// - `user_id` is always `session.user_id` when a session is present
#[derive(Debug, Clone, Default)]
pub struct AuthCtx {
    session: Option<Arc<SessionRecord>>,
    user_id: Option<String>,
}

impl AuthCtx {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(session: SessionRecord) -> Self {
        let user_id = Some(session.user_id.clone());
        Self {
            session: Some(Arc::new(session)),
            user_id,
        }
    }

    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_deref()
    }

    pub fn shared_session(&self) -> Option<Arc<SessionRecord>> {
        self.session.clone()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}
