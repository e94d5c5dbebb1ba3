use rand::Rng;

/// 区间截断
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// [min, max) 区间内的均匀随机数
pub fn random_between(min: f64, max: f64) -> f64 {
    if min >= max {
        return min;
    }
    rand::thread_rng().gen_range(min..max)
}

/// Irwin–Hall 近似高斯采样：n个均匀随机数取平均后标准化
pub fn gaussian(mean: f64, std: f64, n: usize) -> f64 {
    let n = n.max(1);
    let mut rng = rand::thread_rng();
    let sum: f64 = (0..n).map(|_| rng.gen_range(0.0..1.0)).sum();
    // Irwin–Hall: 均值 n/2，方差 n/12
    let normalized = (sum - n as f64 / 2.0) / (n as f64 / 12.0).sqrt();
    mean + std * normalized
}

/// 算术平均
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 无偏标准差（n-1分母）
pub fn std_unbiased(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// 一元线性回归，返回 (截距, 斜率)
///
/// 样本点不足或x方差为0时返回None
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((my - slope * mx, slope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_f64(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp_f64(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp_f64(11.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn test_random_between_bounds() {
        for _ in 0..100 {
            let v = random_between(1.0, 2.0);
            assert!(v >= 1.0 && v < 2.0);
        }
        assert_eq!(random_between(3.0, 3.0), 3.0);
    }

    #[test]
    fn test_gaussian_rough_distribution() {
        let samples: Vec<f64> = (0..5000).map(|_| gaussian(10.0, 2.0, 6)).collect();
        let m = mean(&samples);
        // 5000个样本的均值应落在理论均值附近
        assert!((m - 10.0).abs() < 0.5, "mean was {}", m);
    }

    #[test]
    fn test_std_unbiased() {
        let v = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx_eq!(f64, std_unbiased(&v), 2.13809, epsilon = 0.001));
        assert_eq!(std_unbiased(&[1.0]), 0.0);
    }

    #[test]
    fn test_linear_regression() {
        let xs = vec![0.0, 1.0, 2.0, 3.0];
        let ys = vec![1.0, 3.0, 5.0, 7.0];
        let (b, k) = linear_regression(&xs, &ys).unwrap();
        assert!(approx_eq!(f64, b, 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, k, 2.0, epsilon = 1e-9));
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
        assert!(linear_regression(&[2.0, 2.0], &[1.0, 3.0]).is_none());
    }
}
