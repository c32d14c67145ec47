//! Page outcomes for list endpoints.
//!
//! A list call either yields a page or reports that the listing is
//! exhausted. Exhaustion is not an error, so list operations return
//! `Result<PageOutcome<P>>`: transport and API failures travel in the
//! `Err` arm, `PageOutcome::NoMorePages` in the `Ok` arm.

/// 分页请求结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome<P> {
    /// 新的一页。
    Page(P),
    /// 已无更多页面。
    NoMorePages,
}

impl<P> PageOutcome<P> {
    #[must_use]
    pub fn into_page(self) -> Option<P> {
        match self {
            Self::Page(page) => Some(page),
            Self::NoMorePages => None,
        }
    }

    #[must_use]
    pub const fn as_page(&self) -> Option<&P> {
        match self {
            Self::Page(page) => Some(page),
            Self::NoMorePages => None,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::NoMorePages)
    }

    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> PageOutcome<Q> {
        match self {
            Self::Page(page) => PageOutcome::Page(f(page)),
            Self::NoMorePages => PageOutcome::NoMorePages,
        }
    }
}

/// 服务端用空字符串或缺省字段表示没有下一页。
pub(crate) fn continuation(token: Option<&str>) -> Option<&str> {
    token.filter(|token| !token.is_empty())
}
