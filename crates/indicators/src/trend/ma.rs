//! 简单移动平均

/// 简单移动平均
///
/// 序列头部窗口不足时用 min(i+1, period) 大小的窗口，保证输出等长
pub fn moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut result = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        window_sum += v;
        if i >= period {
            window_sum -= values[i - period];
        }
        let window_len = (i + 1).min(period);
        result.push(window_sum / window_len as f64);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_ma_head_uses_clamped_window() {
        let values = vec![2.0, 4.0, 6.0, 8.0];
        let ma = moving_average(&values, 3);
        assert_eq!(ma.len(), 4);
        assert!(approx_eq!(f64, ma[0], 2.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, ma[1], 3.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, ma[2], 4.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, ma[3], 6.0, epsilon = 1e-12));
    }

    #[test]
    fn test_ma_constant_series() {
        let values = vec![5.0; 10];
        for v in moving_average(&values, 4) {
            assert!(approx_eq!(f64, v, 5.0, epsilon = 1e-12));
        }
    }

    #[test]
    fn test_ma_empty() {
        assert!(moving_average(&[], 5).is_empty());
    }
}
