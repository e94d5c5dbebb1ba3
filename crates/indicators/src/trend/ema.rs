//! 指数移动平均与成交量加权EMA

/// 指数移动平均，平滑系数 k = 2/(period+1)
///
/// ema[0] = x[0]；ema[i] = x[i]·k + ema[i-1]·(1-k)
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    result.push(values[0]);
    for i in 1..values.len() {
        let prev = result[i - 1];
        result.push(values[i] * k + prev * (1.0 - k));
    }
    result
}

/// 成交量加权EMA：EMA(x·v) / EMA(v) 逐元素
///
/// 分母为0的位置返回0
pub fn volume_ema(values: &[f64], volumes: &[f64], period: usize) -> Vec<f64> {
    debug_assert_eq!(values.len(), volumes.len());
    let weighted: Vec<f64> = values
        .iter()
        .zip(volumes.iter())
        .map(|(x, v)| x * v)
        .collect();
    let num = ema(&weighted, period);
    let den = ema(volumes, period);
    num.iter()
        .zip(den.iter())
        .map(|(n, d)| if *d == 0.0 { 0.0 } else { n / d })
        .collect()
}
