use simdeez::*; // nuts

use simdeez::avx2::*;
use simdeez::scalar::*;
use simdeez::sse2::*;
use simdeez::sse41::*;

/// Sum the values of `source` to the values of `target`, writing to `target`.
///
/// Uses runtime selected SIMD operations.
pub fn sum_simd(source: &[f32], target: &mut [f32]) {
    simd_runtime_generate!(
        fn sum(source: &[f32], target: &mut [f32]) {
            let mut source = &source[..source.len()];
            let mut target = &mut target[..source.len()];

            while source.len() >= S::VF32_WIDTH {
                let src = S::loadu_ps(&source[0]);
                let src2 = S::loadu_ps(&target[0]);

                S::storeu_ps(&mut target[0], src + src2);

                source = &source[S::VF32_WIDTH..];
                target = &mut target[S::VF32_WIDTH..];
            }

            for i in 0..source.len() {
                target[i] += source[i];
            }
        }
    );

    sum_runtime_select(source, target);
}

/// Multiply `target` elementwise by `gain`, writing to `target`.
///
/// Uses runtime selected SIMD operations.
pub fn apply_gain_simd(gain: &[f32], target: &mut [f32]) {
    simd_runtime_generate!(
        fn apply_gain(gain: &[f32], target: &mut [f32]) {
            let len = gain.len().min(target.len());
            let mut gain = &gain[..len];
            let mut target = &mut target[..len];

            while gain.len() >= S::VF32_WIDTH {
                let g = S::loadu_ps(&gain[0]);
                let t = S::loadu_ps(&target[0]);

                S::storeu_ps(&mut target[0], g * t);

                gain = &gain[S::VF32_WIDTH..];
                target = &mut target[S::VF32_WIDTH..];
            }

            for i in 0..gain.len() {
                target[i] *= gain[i];
            }
        }
    );

    apply_gain_runtime_select(gain, target);
}

/// Multiply every value of `target` by a constant gain.
pub fn apply_uniform_gain_simd(gain: f32, target: &mut [f32]) {
    simd_runtime_generate!(
        fn apply_uniform(gain: f32, target: &mut [f32]) {
            let mut target = &mut target[..];
            let g = S::set1_ps(gain);

            while target.len() >= S::VF32_WIDTH {
                let t = S::loadu_ps(&target[0]);

                S::storeu_ps(&mut target[0], g * t);

                target = &mut target[S::VF32_WIDTH..];
            }

            for t in target.iter_mut() {
                *t *= gain;
            }
        }
    );

    apply_uniform_runtime_select(gain, target);
}

/// The mean of the squared values of `source`. Returns zero for an empty slice.
pub fn mean_squared_simd(source: &[f32]) -> f32 {
    simd_runtime_generate!(
        fn mean_squared(source: &[f32]) -> f32 {
            let total = source.len();
            if total == 0 {
                return 0.0;
            }

            let mut source = &source[..];
            let mut acc = S::set1_ps(0.0);

            while source.len() >= S::VF32_WIDTH {
                let src = S::loadu_ps(&source[0]);
                acc = acc + src * src;
                source = &source[S::VF32_WIDTH..];
            }

            let mut sum = S::horizontal_add_ps(acc);
            for &v in source.iter() {
                sum += v * v;
            }

            sum / total as f32
        }
    );

    mean_squared_runtime_select(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simd_add() {
        let src = vec![1.0, 2.0, 3.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let mut dst = vec![0.0, 1.0, 3.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        sum_simd(&src, &mut dst);
        assert_eq!(dst, vec![1.0, 3.0, 6.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_simd_gain() {
        let gain = vec![0.5; 9];
        let mut dst = vec![2.0; 9];
        apply_gain_simd(&gain, &mut dst);
        assert_eq!(dst, vec![1.0; 9]);
    }

    #[test]
    fn test_simd_uniform_gain() {
        let mut dst = vec![2.0; 11];
        apply_uniform_gain_simd(0.25, &mut dst);
        assert_eq!(dst, vec![0.5; 11]);
    }

    #[test]
    fn test_simd_mean_squared() {
        let src = vec![2.0; 10];
        assert!((mean_squared_simd(&src) - 4.0).abs() < 1e-6);

        let src = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let expected = src.iter().map(|v| v * v).sum::<f32>() / src.len() as f32;
        assert!((mean_squared_simd(&src) - expected).abs() < 1e-4);

        assert_eq!(mean_squared_simd(&[]), 0.0);
    }
}
