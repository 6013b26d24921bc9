/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth (gate + route policy), cors (trusted origins), http (横断的関心事)
 */
pub mod auth;
pub mod cors;
pub mod http;
