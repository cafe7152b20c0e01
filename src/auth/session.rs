//! 已认证身份

use serde::{Deserialize, Serialize};

/// 一次成功登录得到的身份；要么整体存在，要么整体缺失（由 `AuthState` 承载）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    /// 作为请求归属（X-User-Context / userEmail）
    pub email: String,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            email: email.into(),
        }
    }
}
