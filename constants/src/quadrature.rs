/// Limits for the Gauss-Hermite quadrature tables

/// Highest quadrature order kept in the packed table
pub const MAX_GH_ORDER: usize = 100;

/// Offset of an order's rows inside the packed triangular table
pub const fn table_offset(order: usize) -> usize {
    order * (order - 1) / 2
}

/// Total rows of a packed table holding orders 1..=max_order
pub const fn table_len(max_order: usize) -> usize {
    max_order * (max_order + 1) / 2
}
