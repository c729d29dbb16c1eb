//! 分页结果类型定义

use serde::{Deserialize, Serialize};

/// 分页查询结果
///
/// 不变式：`items.len() <= page_size`、`page >= 1`、`total_count >= items.len()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// 当前页的记录列表
    pub items: Vec<T>,
    /// 匹配过滤条件的记录总数（跨所有页）
    pub total_count: u64,
    /// 当前页码（从1开始）
    pub page: u64,
    /// 每页记录数
    pub page_size: u64,
}

impl<T> PagedResult<T> {
    /// 创建分页结果
    pub fn new(items: Vec<T>, total_count: u64, page: u64, page_size: u64) -> Self {
        Self {
            items,
            total_count,
            page: page.max(1),
            page_size,
        }
    }

    /// 计算总页数
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size)
    }

    /// 判断是否存在下一页
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// 判断当前页是否为空
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let result: PagedResult<i32> = PagedResult::new(vec![1, 2, 3], 25, 1, 10);
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
    }

    #[test]
    fn test_last_page_has_no_next() {
        let result: PagedResult<i32> = PagedResult::new(vec![1, 2, 3, 4, 5], 25, 3, 10);
        assert!(!result.has_next());
    }

    #[test]
    fn test_page_zero_clamped_to_one() {
        let result: PagedResult<i32> = PagedResult::new(vec![], 0, 0, 10);
        assert_eq!(result.page, 1);
        assert!(result.is_empty());
    }
}
