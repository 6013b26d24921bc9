/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - gate が request extensions に載せた AuthCtx を handler に提供する
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - AuthCtx
 * - CurrentSession / CurrentUserId
 */

mod core;
mod types;

pub use self::core::{CurrentSession, CurrentUserId};
pub use types::AuthCtx;
