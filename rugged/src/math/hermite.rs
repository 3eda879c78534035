use nalgebra::Vector3;

/// Hermite interpolation of a vector-valued function.
///
/// Interpolates through `(abscissae[k], values[k])`, matching
/// `derivatives[k]` as well when provided, and returns the interpolated
/// value and first derivative at `x`. Uses Newton divided differences with
/// doubled abscissae for the derivative constraints.
pub fn hermite_vector3(
    abscissae: &[f64],
    values: &[Vector3<f64>],
    derivatives: Option<&[Vector3<f64>]>,
    x: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let repeat = if derivatives.is_some() { 2 } else { 1 };
    let n = abscissae.len() * repeat;

    let mut z = vec![0.0; n];
    let mut table = vec![Vector3::zeros(); n];
    for (k, &a) in abscissae.iter().enumerate() {
        for r in 0..repeat {
            z[repeat * k + r] = a;
            table[repeat * k + r] = values[k];
        }
    }

    // divided differences, column by column; coefficients accumulate on the
    // leading entry of each column
    let mut coefficients = vec![Vector3::zeros(); n];
    coefficients[0] = table[0];
    for column in 1..n {
        for row in (column..n).rev() {
            let dz = z[row] - z[row - column];
            table[row] = if dz == 0.0 {
                // repeated node: the first-order difference is the derivative
                match derivatives {
                    Some(d) => d[row / repeat],
                    None => Vector3::zeros(),
                }
            } else {
                (table[row] - table[row - 1]) / dz
            };
        }
        coefficients[column] = table[column];
    }

    // evaluate the Newton form and its derivative
    let mut value = coefficients[n - 1];
    let mut derivative = Vector3::zeros();
    for k in (0..n - 1).rev() {
        let dx = x - z[k];
        derivative = derivative * dx + value;
        value = value * dx + coefficients[k];
    }
    (value, derivative)
}

#[cfg(test)]
mod tests {
    use super::hermite_vector3;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn cubic(t: f64) -> (Vector3<f64>, Vector3<f64>) {
        (
            Vector3::new(t * t * t - 2.0 * t, 3.0 * t * t + 1.0, -t),
            Vector3::new(3.0 * t * t - 2.0, 6.0 * t, -1.0),
        )
    }

    #[test]
    fn test_cubic_reproduced_from_values() {
        let abscissae = [-1.0, 0.0, 1.5, 3.0];
        let values: Vec<_> = abscissae.iter().map(|&t| cubic(t).0).collect();
        let (value, derivative) = hermite_vector3(&abscissae, &values, None, 0.7);
        let (expected_v, expected_d) = cubic(0.7);
        assert_relative_eq!(value, expected_v, epsilon = 1.0e-12);
        assert_relative_eq!(derivative, expected_d, epsilon = 1.0e-12);
    }

    #[test]
    fn test_cubic_reproduced_from_two_samples_with_derivatives() {
        let abscissae = [0.0, 2.0];
        let values: Vec<_> = abscissae.iter().map(|&t| cubic(t).0).collect();
        let derivatives: Vec<_> = abscissae.iter().map(|&t| cubic(t).1).collect();
        let (value, derivative) =
            hermite_vector3(&abscissae, &values, Some(&derivatives), 1.3);
        let (expected_v, expected_d) = cubic(1.3);
        assert_relative_eq!(value, expected_v, epsilon = 1.0e-12);
        assert_relative_eq!(derivative, expected_d, epsilon = 1.0e-11);
    }

    #[test]
    fn test_matches_samples() {
        let abscissae = [0.0, 1.0, 2.0];
        let values: Vec<_> = abscissae.iter().map(|&t| cubic(t).0).collect();
        let derivatives: Vec<_> = abscissae.iter().map(|&t| cubic(t).1).collect();
        for (k, &t) in abscissae.iter().enumerate() {
            let (value, derivative) = hermite_vector3(&abscissae, &values, Some(&derivatives), t);
            assert_relative_eq!(value, values[k], epsilon = 1.0e-12);
            assert_relative_eq!(derivative, derivatives[k], epsilon = 1.0e-11);
        }
    }
}
