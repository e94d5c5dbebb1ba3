use rand::Rng;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LOCAL_ORDER_ID_LEN: usize = 16;

/// 生成16位小写字母数字的本地订单ID
///
/// 模拟盘订单以及尚未获得远端ID的订单使用
pub fn local_order_id() -> String {
    let mut rng = rand::thread_rng();
    (0..LOCAL_ORDER_ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}
